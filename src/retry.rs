//! Centralized retry policy for remote calls.
//!
//! One policy (max attempts, backoff, retryable predicate) applied uniformly
//! instead of per-call-site retry loops. Only idempotent requests go through
//! [`send_with_retry`]; the non-idempotent draft/commit/upload calls are
//! single-shot by design and their failures stay entry-scoped.

use std::time::Duration;

use crate::error::{MigrationError, SystemSide};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// A fixed-delay policy: every retry waits the same backoff.
    pub fn fixed(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: backoff_ms,
            max_backoff_ms: backoff_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retryable,
    NonRetryable,
}

pub fn retry_decision_for_status(status: reqwest::StatusCode) -> RetryDecision {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        RetryDecision::Retryable
    } else {
        RetryDecision::NonRetryable
    }
}

fn retry_delay(
    attempt: u32,
    policy: &RetryPolicy,
    retry_after: Option<&reqwest::header::HeaderValue>,
) -> Duration {
    if let Some(value) = retry_after.and_then(|v| v.to_str().ok()) {
        if let Ok(secs) = value.parse::<u64>() {
            return Duration::from_secs(secs.min(30));
        }
    }

    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base = policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms);
    let jitter = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0))
        % 150;
    Duration::from_millis(base.saturating_add(jitter))
}

/// Send an idempotent request, retrying transient failures.
///
/// Retryable: 429, 408, 5xx (honoring Retry-After, capped at 30 s), and
/// transport-level timeout/connect errors. Everything else returns the
/// response as-is for the caller to map.
pub async fn send_with_retry(
    system: SystemSide,
    request: reqwest::RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, MigrationError> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let Some(cloned) = request.try_clone() else {
            return request
                .send()
                .await
                .map_err(|e| MigrationError::transport(system, e));
        };

        match cloned.send().await {
            Ok(response) => {
                let status = response.status();
                if retry_decision_for_status(status) == RetryDecision::Retryable
                    && attempt < attempts
                {
                    let delay = retry_delay(
                        attempt,
                        policy,
                        response.headers().get(reqwest::header::RETRY_AFTER),
                    );
                    log::warn!(
                        "{} retry {}/{} after status {} (sleep {:?})",
                        system,
                        attempt,
                        attempts,
                        status,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Ok(response);
            }
            Err(err) => {
                let retryable_transport = err.is_timeout() || err.is_connect();
                if retryable_transport && attempt < attempts {
                    let delay = retry_delay(attempt, policy, None);
                    log::warn!(
                        "{} retry {}/{} after transport error: {} (sleep {:?})",
                        system,
                        attempt,
                        attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(MigrationError::transport(system, err));
            }
        }
    }

    Err(MigrationError::Transport {
        system,
        message: "request exhausted retries".to_string(),
    })
}

/// Map a non-success response into a classified error, reading the body for
/// the message. 401/403 map to credential failures.
pub(crate) async fn ensure_success(
    system: SystemSide,
    response: reqwest::Response,
) -> Result<reqwest::Response, MigrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MigrationError::api(system, status.as_u16(), body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_decision_for_status() {
        assert_eq!(
            retry_decision_for_status(reqwest::StatusCode::TOO_MANY_REQUESTS),
            RetryDecision::Retryable
        );
        assert_eq!(
            retry_decision_for_status(reqwest::StatusCode::BAD_GATEWAY),
            RetryDecision::Retryable
        );
        assert_eq!(
            retry_decision_for_status(reqwest::StatusCode::NOT_FOUND),
            RetryDecision::NonRetryable
        );
        assert_eq!(
            retry_decision_for_status(reqwest::StatusCode::UNAUTHORIZED),
            RetryDecision::NonRetryable
        );
    }

    #[test]
    fn test_retry_delay_exponential_capped() {
        let policy = RetryPolicy::default();
        let d1 = retry_delay(1, &policy, None);
        let d3 = retry_delay(3, &policy, None);
        assert!(d1 >= Duration::from_millis(250));
        assert!(d1 < Duration::from_millis(450));
        // 250 * 2^2 = 1000, plus jitter
        assert!(d3 >= Duration::from_millis(1_000));
        assert!(d3 <= Duration::from_millis(2_150));
    }

    #[test]
    fn test_retry_delay_honors_retry_after() {
        let policy = RetryPolicy::default();
        let header = reqwest::header::HeaderValue::from_static("7");
        assert_eq!(
            retry_delay(1, &policy, Some(&header)),
            Duration::from_secs(7)
        );
        // Excessive server hints are capped
        let header = reqwest::header::HeaderValue::from_static("600");
        assert_eq!(
            retry_delay(1, &policy, Some(&header)),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_fixed_policy() {
        let policy = RetryPolicy::fixed(2, 500);
        assert_eq!(retry_delay(1, &policy, None).as_millis() as u64 / 100, 5);
        // No exponential growth for fixed policies
        let d2 = retry_delay(2, &policy, None);
        assert!(d2 >= Duration::from_millis(500));
        assert!(d2 < Duration::from_millis(700));
    }
}
