//! Core domain types shared across the engine.
//!
//! Wire-facing structs mirror the JSON both systems speak (camelCase, with
//! `#[serde(default)]` on fields older records may omit). Source records are
//! treated as immutable once fetched.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Source activity records
// ---------------------------------------------------------------------------

/// The author of a source activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// An external (non-directory) attendee on a note or meeting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAttendee {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// The note body of a source activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteBody {
    /// Source-side activity type name (e.g. "EBR", "Call", "Note").
    #[serde(rename = "type", default)]
    pub note_type: String,
    #[serde(default)]
    pub subject: String,
    /// ISO 8601 timestamp of when the activity happened.
    #[serde(default)]
    pub activity_date: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub plain_text: String,
    /// Directory attendee emails (same org as the author).
    #[serde(default)]
    pub internal_attendees: Vec<String>,
    #[serde(default)]
    pub external_attendees: Vec<ExternalAttendee>,
    #[serde(default)]
    pub custom_fields: serde_json::Map<String, serde_json::Value>,
}

/// A record the activity is attached to on the source side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRef {
    /// Object kind, e.g. "Company".
    #[serde(default)]
    pub obj: String,
    /// Source-side object id.
    #[serde(default)]
    pub id: String,
    /// Display label (company name for company contexts).
    #[serde(default)]
    pub lbl: String,
}

/// A binary attachment reference on a source activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type", default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityMeta {
    #[serde(default)]
    pub activity_type_id: Option<String>,
    #[serde(default)]
    pub external_source_details: Option<serde_json::Value>,
}

/// A single immutable engagement record fetched from the source system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: String,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub note: NoteBody,
    #[serde(default)]
    pub contexts: Vec<ContextRef>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    #[serde(default)]
    pub meta: ActivityMeta,
}

impl ActivityRecord {
    /// The company this activity belongs to, if any context carries one.
    pub fn company_context(&self) -> Option<&ContextRef> {
        self.contexts
            .iter()
            .find(|c| c.obj.eq_ignore_ascii_case("company"))
    }

    /// Source milestone type id, when present on the custom fields.
    pub fn milestone_type_id(&self) -> Option<&str> {
        self.note
            .custom_fields
            .get("milestoneTypeId")
            .and_then(|v| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Pagination envelope (shared by both systems)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub total_pages: u32,
}

/// `{content: [...], page: {number, totalPages}}` envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    #[serde(default)]
    pub content: Vec<T>,
    #[serde(default)]
    pub page: Page,
}

/// An `{id, label}` entry from a category-list endpoint
/// (activity types, sub-activity types, meeting subtypes, milestone types).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryItem {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

// ---------------------------------------------------------------------------
// Run inputs
// ---------------------------------------------------------------------------

/// Connection details for the source system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConnection {
    pub base_url: String,
    pub api_token: String,
}

/// Connection details for the target system. The api token doubles as the
/// generic non-impersonated credential when per-author sessions cannot be
/// acquired.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConnection {
    pub base_url: String,
    pub api_token: String,
}

/// One author whose history should be migrated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSpec {
    #[serde(default)]
    pub name: String,
    pub email: String,
}
