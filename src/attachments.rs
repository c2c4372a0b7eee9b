//! Attachment relay: source bytes in, target uploads out.
//!
//! Attachments are best-effort. A failed download or upload is logged and
//! skipped; the owning entry migrates without it. Uploads are spaced by a
//! short fixed delay for rate-limit safety.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::source::SourceClient;
use crate::target::{AttachmentUpload, TargetClient, UploadedFile};
use crate::types::AttachmentRef;

/// A relayed attachment as it appears on the draft payload: original
/// name/size/type, target id/url/createdDate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAttachment {
    pub id: String,
    pub name: String,
    pub url: String,
    pub size: u64,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
}

/// Merge the original reference with the upload response: identity fields
/// come from the target, descriptive fields stay as they were.
fn merge_uploaded(original: &AttachmentRef, uploaded: UploadedFile) -> UploadedAttachment {
    UploadedAttachment {
        id: uploaded.id,
        name: original.name.clone(),
        url: uploaded.url,
        size: original.size,
        content_type: original.content_type.clone(),
        created_date: uploaded.created_date,
    }
}

/// Identity the uploads get associated with on the target side.
pub struct AttachmentOwner<'a> {
    pub company_id: &'a str,
    pub company_label: &'a str,
    pub user_id: &'a str,
    pub user_name: &'a str,
    pub user_email: &'a str,
}

/// Relay every attachment of one entry. Never fails: the returned list
/// contains whatever made it across.
pub async fn relay_attachments(
    source: &SourceClient,
    target: &TargetClient,
    attachments: &[AttachmentRef],
    owner: &AttachmentOwner<'_>,
    session: &str,
    delay: Duration,
) -> Vec<UploadedAttachment> {
    let mut uploaded = Vec::new();

    for (index, attachment) in attachments.iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let bytes = match source.download_attachment(&attachment.url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!(
                    "skipping attachment '{}' (download failed): {}",
                    attachment.name,
                    e
                );
                continue;
            }
        };

        let upload = AttachmentUpload {
            bytes,
            file_name: attachment.name.clone(),
            content_type: attachment.content_type.clone(),
            company_id: owner.company_id.to_string(),
            company_label: owner.company_label.to_string(),
            user_id: owner.user_id.to_string(),
            user_name: owner.user_name.to_string(),
            user_email: owner.user_email.to_string(),
            session: session.to_string(),
        };

        match target.upload_attachment(upload).await {
            Ok(file) => {
                log::debug!("relayed attachment '{}' as {}", attachment.name, file.id);
                uploaded.push(merge_uploaded(attachment, file));
            }
            Err(e) => {
                log::warn!(
                    "skipping attachment '{}' (upload failed): {}",
                    attachment.name,
                    e
                );
            }
        }
    }

    uploaded
}
