//! HTTP client for the source record-keeping system.
//!
//! Bearer-token auth, fixed request timeout, idempotent GETs routed through
//! the shared retry policy.

use std::time::Duration;

use url::Url;

use crate::error::{MigrationError, SystemSide};
use crate::retry::{ensure_success, send_with_retry, RetryPolicy};
use crate::types::{ActivityRecord, CategoryItem, Paged, SourceConnection};

#[derive(Debug)]
pub struct SourceClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
    retry: RetryPolicy,
}

impl SourceClient {
    pub fn new(conn: &SourceConnection, timeout: Duration) -> Result<Self, MigrationError> {
        Url::parse(&conn.base_url)
            .map_err(|e| MigrationError::Validation(format!("source baseUrl: {}", e)))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MigrationError::Validation(format!("source http client: {}", e)))?;
        Ok(Self {
            http,
            base_url: conn.base_url.trim_end_matches('/').to_string(),
            api_token: conn.api_token.clone(),
            retry: RetryPolicy::default(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch one page of an author's activity history, oldest-first order as
    /// the source returns it.
    pub async fn fetch_activities(
        &self,
        author_email: &str,
        page: u32,
        size: u32,
    ) -> Result<Paged<ActivityRecord>, MigrationError> {
        let request = self
            .http
            .get(self.endpoint("/api/v1/activities"))
            .bearer_auth(&self.api_token)
            .query(&[
                ("author", author_email.to_string()),
                ("page", page.to_string()),
                ("size", size.to_string()),
            ]);

        let resp = send_with_retry(SystemSide::Source, request, &self.retry).await?;
        let resp = ensure_success(SystemSide::Source, resp).await?;
        resp.json()
            .await
            .map_err(|e| MigrationError::transport(SystemSide::Source, e))
    }

    /// Milestone types configured for a source company.
    pub async fn milestone_types(
        &self,
        company_id: &str,
    ) -> Result<Vec<CategoryItem>, MigrationError> {
        let request = self
            .http
            .get(self.endpoint(&format!("/api/v1/companies/{}/milestone-types", company_id)))
            .bearer_auth(&self.api_token);

        let resp = send_with_retry(SystemSide::Source, request, &self.retry).await?;
        let resp = ensure_success(SystemSide::Source, resp).await?;
        resp.json()
            .await
            .map_err(|e| MigrationError::transport(SystemSide::Source, e))
    }

    /// Download an attachment as an opaque byte buffer. The URL is absolute
    /// (as carried on the activity record), not relative to the base URL.
    pub async fn download_attachment(&self, url: &str) -> Result<Vec<u8>, MigrationError> {
        Url::parse(url)
            .map_err(|e| MigrationError::Validation(format!("attachment url '{}': {}", url, e)))?;

        let request = self.http.get(url).bearer_auth(&self.api_token);
        let resp = send_with_retry(SystemSide::Source, request, &self.retry).await?;
        let resp = ensure_success(SystemSide::Source, resp).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| MigrationError::transport(SystemSide::Source, e))?;
        Ok(bytes.to_vec())
    }
}
