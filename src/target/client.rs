//! HTTP client for the target record-keeping system.
//!
//! Idempotent GETs (directories, category lists, the credential probe) go
//! through the shared retry policy. The draft-create, commit-create, and
//! attachment-upload POSTs are single-shot: they are not idempotent, and a
//! failed create is an entry-scoped failure, not something to re-send.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MigrationError, SystemSide};
use crate::migrate::payload::DraftPayload;
use crate::retry::{ensure_success, send_with_retry, RetryPolicy};
use crate::types::{CategoryItem, Paged, TargetConnection};

/// Header carrying the per-author impersonation credential.
const SESSION_HEADER: &str = "X-Session-Token";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCompany {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Response from the lightweight "current profile" probe.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetProfile {
    pub id: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedObject {
    id: String,
}

/// Response from the attachment upload endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub created_date: Option<String>,
}

/// Everything the attachment upload endpoint needs in one place.
pub struct AttachmentUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: Option<String>,
    pub company_id: String,
    pub company_label: String,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub session: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitRequest<'a> {
    draft_id: &'a str,
    #[serde(flatten)]
    payload: &'a DraftPayload,
}

pub struct TargetClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
    retry: RetryPolicy,
}

impl TargetClient {
    pub fn new(conn: &TargetConnection, timeout: Duration) -> Result<Self, MigrationError> {
        Url::parse(&conn.base_url)
            .map_err(|e| MigrationError::Validation(format!("target baseUrl: {}", e)))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MigrationError::Validation(format!("target http client: {}", e)))?;
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

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http.get(self.endpoint(path)).bearer_auth(&self.api_token)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, MigrationError> {
        resp.json()
            .await
            .map_err(|e| MigrationError::transport(SystemSide::Target, e))
    }

    // -----------------------------------------------------------------------
    // Probe
    // -----------------------------------------------------------------------

    /// Fetch the profile behind a credential.
    ///
    /// With `session: None` this identifies the api token's own system user;
    /// with a session credential it doubles as the cheap validity probe for
    /// cached impersonation sessions.
    pub async fn current_profile(
        &self,
        session: Option<&str>,
    ) -> Result<TargetProfile, MigrationError> {
        let mut request = self.get("/api/v1/users/me");
        if let Some(credential) = session {
            request = request.header(SESSION_HEADER, credential);
        }
        let resp = send_with_retry(SystemSide::Target, request, &self.retry).await?;
        let resp = ensure_success(SystemSide::Target, resp).await?;
        Self::read_json(resp).await
    }

    // -----------------------------------------------------------------------
    // Directories
    // -----------------------------------------------------------------------

    pub async fn users_page(
        &self,
        page: u32,
        size: u32,
    ) -> Result<Paged<TargetUser>, MigrationError> {
        let request = self.get("/api/v1/users").query(&[
            ("page", page.to_string()),
            ("size", size.to_string()),
        ]);
        let resp = send_with_retry(SystemSide::Target, request, &self.retry).await?;
        let resp = ensure_success(SystemSide::Target, resp).await?;
        Self::read_json(resp).await
    }

    pub async fn companies_page(
        &self,
        page: u32,
        size: u32,
    ) -> Result<Paged<TargetCompany>, MigrationError> {
        let request = self.get("/api/v1/companies").query(&[
            ("page", page.to_string()),
            ("size", size.to_string()),
        ]);
        let resp = send_with_retry(SystemSide::Target, request, &self.retry).await?;
        let resp = ensure_success(SystemSide::Target, resp).await?;
        Self::read_json(resp).await
    }

    /// Walk the full user directory.
    pub async fn list_users(&self, page_size: u32) -> Result<Vec<TargetUser>, MigrationError> {
        let mut all = Vec::new();
        let mut page = 0;
        loop {
            let resp = self.users_page(page, page_size).await?;
            let total = resp.page.total_pages;
            all.extend(resp.content);
            page += 1;
            if total == 0 || page >= total {
                break;
            }
        }
        Ok(all)
    }

    /// Walk the full company directory.
    pub async fn list_companies(
        &self,
        page_size: u32,
    ) -> Result<Vec<TargetCompany>, MigrationError> {
        let mut all = Vec::new();
        let mut page = 0;
        loop {
            let resp = self.companies_page(page, page_size).await?;
            let total = resp.page.total_pages;
            all.extend(resp.content);
            page += 1;
            if total == 0 || page >= total {
                break;
            }
        }
        Ok(all)
    }

    // -----------------------------------------------------------------------
    // Category lists (scoped by company)
    // -----------------------------------------------------------------------

    async fn category_list(&self, path: String) -> Result<Vec<CategoryItem>, MigrationError> {
        let request = self.http.get(self.endpoint(&path)).bearer_auth(&self.api_token);
        let resp = send_with_retry(SystemSide::Target, request, &self.retry).await?;
        let resp = ensure_success(SystemSide::Target, resp).await?;
        Self::read_json(resp).await
    }

    pub async fn activity_types(
        &self,
        company_id: &str,
    ) -> Result<Vec<CategoryItem>, MigrationError> {
        self.category_list(format!("/api/v1/companies/{}/activity-types", company_id))
            .await
    }

    pub async fn sub_activity_types(
        &self,
        company_id: &str,
    ) -> Result<Vec<CategoryItem>, MigrationError> {
        self.category_list(format!("/api/v1/companies/{}/sub-activity-types", company_id))
            .await
    }

    /// Meeting-specific subtypes, a separate list from the general
    /// sub-activity types.
    pub async fn meeting_subtypes(
        &self,
        company_id: &str,
    ) -> Result<Vec<CategoryItem>, MigrationError> {
        self.category_list(format!("/api/v1/companies/{}/meeting-types", company_id))
            .await
    }

    pub async fn milestone_types(
        &self,
        company_id: &str,
    ) -> Result<Vec<CategoryItem>, MigrationError> {
        self.category_list(format!("/api/v1/companies/{}/milestone-types", company_id))
            .await
    }

    // -----------------------------------------------------------------------
    // Draft / commit creates
    // -----------------------------------------------------------------------

    /// Phase one: create the provisional activity. Returns the temporary
    /// draft id. Single-shot.
    pub async fn create_draft(
        &self,
        payload: &DraftPayload,
        session: &str,
    ) -> Result<String, MigrationError> {
        let resp = self
            .http
            .post(self.endpoint("/api/v1/activities/draft"))
            .bearer_auth(&self.api_token)
            .header(SESSION_HEADER, session)
            .json(payload)
            .send()
            .await
            .map_err(|e| MigrationError::transport(SystemSide::Target, e))?;
        let resp = ensure_success(SystemSide::Target, resp).await?;
        let created: CreatedObject = Self::read_json(resp).await?;
        Ok(created.id)
    }

    /// Phase two: re-submit the payload with the draft id as the permanent
    /// create. Returns the final activity id. Single-shot.
    pub async fn commit_activity(
        &self,
        draft_id: &str,
        payload: &DraftPayload,
        session: &str,
    ) -> Result<String, MigrationError> {
        let body = CommitRequest { draft_id, payload };
        let resp = self
            .http
            .post(self.endpoint("/api/v1/activities"))
            .bearer_auth(&self.api_token)
            .header(SESSION_HEADER, session)
            .json(&body)
            .send()
            .await
            .map_err(|e| MigrationError::transport(SystemSide::Target, e))?;
        let resp = ensure_success(SystemSide::Target, resp).await?;
        let created: CreatedObject = Self::read_json(resp).await?;
        Ok(created.id)
    }

    // -----------------------------------------------------------------------
    // Attachment upload
    // -----------------------------------------------------------------------

    /// Upload one attachment, associating it with the resolved company and
    /// author. Single-shot.
    pub async fn upload_attachment(
        &self,
        upload: AttachmentUpload,
    ) -> Result<UploadedFile, MigrationError> {
        let metadata = serde_json::json!({
            "companyId": upload.company_id,
            "companyLabel": upload.company_label,
            "userId": upload.user_id,
            "userName": upload.user_name,
            "userEmail": upload.user_email,
        });

        let mut file_part =
            reqwest::multipart::Part::bytes(upload.bytes).file_name(upload.file_name);
        if let Some(mime) = upload.content_type.as_deref() {
            file_part = file_part
                .mime_str(mime)
                .map_err(|e| MigrationError::Validation(format!("attachment mime: {}", e)))?;
        }

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("metadata", metadata.to_string());

        let resp = self
            .http
            .post(self.endpoint("/api/v1/attachments"))
            .bearer_auth(&self.api_token)
            .header(SESSION_HEADER, upload.session.as_str())
            .multipart(form)
            .send()
            .await
            .map_err(|e| MigrationError::transport(SystemSide::Target, e))?;
        let resp = ensure_success(SystemSide::Target, resp).await?;
        Self::read_json(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> TargetConnection {
        TargetConnection {
            base_url: "https://new.example.com".into(),
            api_token: "tok".into(),
        }
    }

    #[test]
    fn test_endpoint_building() {
        let client = TargetClient::new(&conn(), Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.endpoint("/api/v1/users/me"),
            "https://new.example.com/api/v1/users/me"
        );
    }

    #[test]
    fn test_new_rejects_bad_url() {
        let bad = TargetConnection {
            base_url: "://nope".into(),
            api_token: "tok".into(),
        };
        assert!(TargetClient::new(&bad, Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_directory_page_deserialization() {
        let json = r#"{
            "content": [
                {"id": "u-1", "email": "sarah.chen@newco.com", "name": "Sarah Chen"},
                {"id": "u-2", "email": "lee@newco.com", "name": "Lee Park"}
            ],
            "page": {"number": 1, "totalPages": 2}
        }"#;
        let page: Paged<TargetUser> = serde_json::from_str(json).unwrap();
        assert_eq!(page.content[0].id, "u-1");
        assert_eq!(page.page.number, 1);
    }

    #[test]
    fn test_uploaded_file_deserialization() {
        let json = r#"{"id": "f-9", "url": "https://cdn.example.com/f-9", "createdDate": "2026-01-05T10:00:00Z"}"#;
        let file: UploadedFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.id, "f-9");
        assert_eq!(file.created_date.as_deref(), Some("2026-01-05T10:00:00Z"));
    }

    #[test]
    fn test_commit_request_shape() {
        let payload = DraftPayload::default();
        let body = CommitRequest {
            draft_id: "draft-3",
            payload: &payload,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["draftId"], "draft-3");
        // Flattened payload fields sit alongside the draft id
        assert!(value.get("note").is_some());
        assert!(value.get("author").is_some());
    }
}
