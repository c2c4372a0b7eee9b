//! Per-author impersonation sessions for the target system.
//!
//! Lifecycle: cache hit → probe verify → reuse, or evict → fresh acquire.
//! Fresh acquisition delegates to the external browser-automation
//! collaborator behind [`SessionBroker`]; persistent acquisition failure
//! degrades to the generic non-impersonated credential so the entry still
//! migrates (attributed to the system user instead of the original author).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::MigrationError;
use crate::target::TargetClient;
use crate::util::normalize_email;

/// Retries after the first failed acquisition attempt.
const ACQUIRE_RETRIES: u32 = 2;
/// Fixed backoff between acquisition attempts.
const ACQUIRE_BACKOFF: Duration = Duration::from_millis(2_000);

/// The browser-automation collaborator that logs in as an author and hands
/// back an opaque session credential.
#[async_trait]
pub trait SessionBroker: Send + Sync {
    async fn acquire(&self, author_email: &str) -> Result<String, MigrationError>;
}

/// Cheap validity check for a cached credential.
#[async_trait]
pub trait SessionProbe: Send + Sync {
    async fn verify(&self, credential: &str) -> bool;
}

#[async_trait]
impl SessionProbe for TargetClient {
    async fn verify(&self, credential: &str) -> bool {
        self.current_profile(Some(credential)).await.is_ok()
    }
}

// ---------------------------------------------------------------------------
// Broker implementations
// ---------------------------------------------------------------------------

/// Talks to the automation service over HTTP:
/// `POST {endpoint}` with `{"authorEmail": ...}` → `{"credential": ...}`.
pub struct HttpSessionBroker {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpSessionBroker {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, MigrationError> {
        Url::parse(endpoint)
            .map_err(|e| MigrationError::Validation(format!("automation url: {}", e)))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MigrationError::Validation(format!("automation http client: {}", e)))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
        })
    }
}

#[derive(serde::Deserialize)]
struct AcquireResponse {
    credential: String,
}

#[async_trait]
impl SessionBroker for HttpSessionBroker {
    async fn acquire(&self, author_email: &str) -> Result<String, MigrationError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({ "authorEmail": author_email }))
            .send()
            .await
            .map_err(|e| MigrationError::Session {
                email: author_email.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MigrationError::Session {
                email: author_email.to_string(),
                reason: format!("automation service returned {}: {}", status, body),
            });
        }

        let parsed: AcquireResponse = resp.json().await.map_err(|e| MigrationError::Session {
            email: author_email.to_string(),
            reason: format!("bad automation response: {}", e),
        })?;
        Ok(parsed.credential)
    }
}

/// Used when no automation endpoint is configured: every acquisition fails,
/// so every entry runs on the generic credential.
pub struct DisabledSessionBroker;

#[async_trait]
impl SessionBroker for DisabledSessionBroker {
    async fn acquire(&self, author_email: &str) -> Result<String, MigrationError> {
        Err(MigrationError::Session {
            email: author_email.to_string(),
            reason: "no automation endpoint configured".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

pub struct SessionManager {
    broker: Box<dyn SessionBroker>,
    /// The target api token; used when impersonation cannot be acquired.
    fallback_credential: String,
    cache: HashMap<String, String>,
}

impl SessionManager {
    pub fn new(broker: Box<dyn SessionBroker>, fallback_credential: String) -> Self {
        Self {
            broker,
            fallback_credential,
            cache: HashMap::new(),
        }
    }

    /// Seed a known-good credential, e.g. when resuming a run.
    pub fn preload(&mut self, author_email: &str, credential: String) {
        self.cache.insert(normalize_email(author_email), credential);
    }

    /// Credential to act as this author. Never fails: a persistent
    /// acquisition failure returns the generic fallback credential.
    pub async fn session_for(&mut self, author_email: &str, probe: &dyn SessionProbe) -> String {
        let key = normalize_email(author_email);

        if let Some(credential) = self.cache.get(&key) {
            if probe.verify(credential).await {
                return credential.clone();
            }
            log::info!("cached session for {} failed probe, refreshing", author_email);
            self.cache.remove(&key);
        }

        match self.acquire_fresh(author_email).await {
            Ok(credential) => {
                self.cache.insert(key, credential.clone());
                credential
            }
            Err(e) => {
                log::warn!(
                    "session acquisition for {} failed, using generic credential: {}",
                    author_email,
                    e
                );
                self.fallback_credential.clone()
            }
        }
    }

    async fn acquire_fresh(&self, author_email: &str) -> Result<String, MigrationError> {
        let attempts = 1 + ACQUIRE_RETRIES;
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.broker.acquire(author_email).await {
                Ok(credential) => return Ok(credential),
                Err(e) => {
                    log::warn!(
                        "session acquire {}/{} for {} failed: {}",
                        attempt,
                        attempts,
                        author_email,
                        e
                    );
                    last_err = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(ACQUIRE_BACKOFF).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| MigrationError::Session {
            email: author_email.to_string(),
            reason: "acquisition failed".to_string(),
        }))
    }
}
