//! Draft payload assembly.
//!
//! Takes a source record plus the resolved identities and builds the
//! target-shaped create body. The same payload is sent to both phases of
//! the draft-commit protocol.

use serde::{Deserialize, Serialize};

use crate::attachments::UploadedAttachment;
use crate::mapping::ResolvedActivityType;
use crate::types::{ActivityRecord, ExternalAttendee};

/// Custom field carrying the source entry id on every migrated record, so a
/// target record can always be traced back to its origin.
pub const SOURCE_ENTRY_ID_FIELD: &str = "sourceEntryId";

/// Source-system tag stamped on migrated records.
pub const SOURCE_SYSTEM_TAG: &str = "backhaul";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadAuthor {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadNote {
    #[serde(rename = "type")]
    pub note_type: String,
    pub subject: String,
    pub activity_date: String,
    pub content: String,
    pub plain_text: String,
    /// Resolved target user ids.
    pub internal_attendees: Vec<String>,
    pub external_attendees: Vec<ExternalAttendee>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_activity_type_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_type_id: Option<String>,
    pub custom_fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadContext {
    pub obj: String,
    pub id: String,
    pub lbl: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_type_id: Option<String>,
    pub source: String,
}

/// The target-shaped create body. Draft and committed states share this
/// shape; the commit request adds the draft id alongside it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPayload {
    pub author: PayloadAuthor,
    pub note: PayloadNote,
    pub contexts: Vec<PayloadContext>,
    pub attachments: Vec<UploadedAttachment>,
    pub meta: PayloadMeta,
}

/// Everything the entry flow resolved before assembly.
#[derive(Debug, Clone, Default)]
pub struct ResolvedIdentities {
    pub author_user_id: String,
    pub company_id: String,
    pub company_label: String,
    pub activity_type: ResolvedActivityType,
    pub milestone_type_id: Option<String>,
    pub internal_attendee_ids: Vec<String>,
    pub attachments: Vec<UploadedAttachment>,
}

/// Assemble the target payload for one source record.
pub fn build_payload(entry: &ActivityRecord, resolved: &ResolvedIdentities) -> DraftPayload {
    let mut custom_fields = entry.note.custom_fields.clone();
    custom_fields.insert(
        SOURCE_ENTRY_ID_FIELD.to_string(),
        serde_json::Value::String(entry.id.clone()),
    );

    DraftPayload {
        author: PayloadAuthor {
            id: resolved.author_user_id.clone(),
            name: entry.author.name.clone(),
            email: entry.author.email.clone(),
        },
        note: PayloadNote {
            note_type: entry.note.note_type.clone(),
            subject: entry.note.subject.clone(),
            activity_date: entry.note.activity_date.clone(),
            content: entry.note.content.clone(),
            plain_text: entry.note.plain_text.clone(),
            internal_attendees: resolved.internal_attendee_ids.clone(),
            external_attendees: entry.note.external_attendees.clone(),
            sub_activity_type_id: resolved.activity_type.sub_activity_type_id.clone(),
            milestone_type_id: resolved.milestone_type_id.clone(),
            custom_fields,
        },
        contexts: vec![PayloadContext {
            obj: "Company".to_string(),
            id: resolved.company_id.clone(),
            lbl: resolved.company_label.clone(),
        }],
        attachments: resolved.attachments.clone(),
        meta: PayloadMeta {
            activity_type_id: resolved.activity_type.activity_type_id.clone(),
            source: SOURCE_SYSTEM_TAG.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Author, ContextRef, NoteBody};

    fn sample_entry() -> ActivityRecord {
        let mut custom_fields = serde_json::Map::new();
        custom_fields.insert("region".into(), serde_json::Value::String("EMEA".into()));
        ActivityRecord {
            id: "act-9001".into(),
            author: Author {
                name: "Sarah Chen".into(),
                email: "sarah.chen@vendor.com".into(),
            },
            note: NoteBody {
                note_type: "EBR".into(),
                subject: "Q3 Executive Business Review".into(),
                activity_date: "2025-09-12T16:00:00Z".into(),
                content: "<p>Notes</p>".into(),
                plain_text: "Notes".into(),
                external_attendees: vec![ExternalAttendee {
                    name: Some("Pat Doe".into()),
                    email: Some("pat@acme.com".into()),
                }],
                custom_fields,
                ..Default::default()
            },
            contexts: vec![ContextRef {
                obj: "Company".into(),
                id: "src-cmp-9".into(),
                lbl: "Acme Corp".into(),
            }],
            ..Default::default()
        }
    }

    fn sample_resolved() -> ResolvedIdentities {
        ResolvedIdentities {
            author_user_id: "u-42".into(),
            company_id: "cmp-1".into(),
            company_label: "Acme Corp".into(),
            activity_type: ResolvedActivityType {
                activity_type_id: Some("at-1".into()),
                sub_activity_type_id: Some("mt-1".into()),
            },
            milestone_type_id: Some("tm-1".into()),
            internal_attendee_ids: vec!["u-42".into(), "u-7".into()],
            attachments: vec![UploadedAttachment {
                id: "f-9".into(),
                name: "deck.pdf".into(),
                url: "https://cdn.new.example.com/f-9".into(),
                size: 20480,
                content_type: Some("application/pdf".into()),
                created_date: None,
            }],
        }
    }

    #[test]
    fn test_build_payload_carries_source_entry_id() {
        let payload = build_payload(&sample_entry(), &sample_resolved());
        assert_eq!(
            payload.note.custom_fields[SOURCE_ENTRY_ID_FIELD],
            serde_json::Value::String("act-9001".into())
        );
        // Original custom fields survive
        assert_eq!(
            payload.note.custom_fields["region"],
            serde_json::Value::String("EMEA".into())
        );
    }

    #[test]
    fn test_build_payload_single_company_context() {
        let payload = build_payload(&sample_entry(), &sample_resolved());
        assert_eq!(payload.contexts.len(), 1);
        assert_eq!(payload.contexts[0].obj, "Company");
        // Target company id, original label
        assert_eq!(payload.contexts[0].id, "cmp-1");
        assert_eq!(payload.contexts[0].lbl, "Acme Corp");
    }

    #[test]
    fn test_build_payload_author_attribution() {
        let payload = build_payload(&sample_entry(), &sample_resolved());
        assert_eq!(payload.author.id, "u-42");
        assert_eq!(payload.author.email, "sarah.chen@vendor.com");
        assert_eq!(payload.note.internal_attendees, vec!["u-42", "u-7"]);
        assert_eq!(payload.note.external_attendees.len(), 1);
    }

    #[test]
    fn test_payload_wire_shape() {
        let payload = build_payload(&sample_entry(), &sample_resolved());
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["note"]["type"], "EBR");
        assert_eq!(value["note"]["subActivityTypeId"], "mt-1");
        assert_eq!(value["note"]["milestoneTypeId"], "tm-1");
        assert_eq!(value["meta"]["activityTypeId"], "at-1");
        assert_eq!(value["meta"]["source"], SOURCE_SYSTEM_TAG);
        assert_eq!(value["attachments"][0]["id"], "f-9");
    }

    #[test]
    fn test_payload_omits_unresolved_taxonomy() {
        let mut resolved = sample_resolved();
        resolved.activity_type = ResolvedActivityType::default();
        resolved.milestone_type_id = None;

        let value = serde_json::to_value(build_payload(&sample_entry(), &resolved)).unwrap();
        assert!(value["note"].get("subActivityTypeId").is_none());
        assert!(value["note"].get("milestoneTypeId").is_none());
        assert!(value["meta"].get("activityTypeId").is_none());
    }
}
