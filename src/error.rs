//! Error types for the migration engine.
//!
//! Every failure carries enough structure to be classified into the fixed
//! reporting taxonomy via [`MigrationError::code`]. Classification happens at
//! the failure site through the variant, never by matching message text.

use thiserror::Error;

/// Which of the two systems a remote failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemSide {
    Source,
    Target,
}

impl std::fmt::Display for SystemSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemSide::Source => write!(f, "source"),
            SystemSide::Target => write!(f, "target"),
        }
    }
}

/// Fixed failure taxonomy used for tracking and reporting.
///
/// Serialized form matches the wire codes consumers expect,
/// e.g. `COMPANY_MAPPING_ERROR`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ApiError,
    ValidationError,
    TimeoutError,
    AuthError,
    CompanyMappingError,
    UserMappingError,
    ActivityTypeError,
    AttachmentError,
    BatchError,
    UnknownError,
}

/// Errors raised anywhere in the migration engine.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{system} request failed: {message}")]
    Transport { system: SystemSide, message: String },

    #[error("{system} request timed out")]
    Timeout { system: SystemSide },

    #[error("{system} API error {status}: {message}")]
    Api {
        system: SystemSide,
        status: u16,
        message: String,
    },

    #[error("{system} rejected credentials")]
    Auth { system: SystemSide },

    #[error("no target company mapping for '{0}'")]
    CompanyMapping(String),

    #[error("no target user mapping for '{0}'")]
    UserMapping(String),

    #[error("unresolved activity type '{0}'")]
    ActivityType(String),

    #[error("attachment '{name}' failed: {reason}")]
    Attachment { name: String, reason: String },

    #[error("draft creation failed for entry {entry_id}: {reason}")]
    DraftCreation { entry_id: String, reason: String },

    #[error("session acquisition failed for {email}: {reason}")]
    Session { email: String, reason: String },

    #[error("batch aborted: {0}")]
    Batch(String),

    #[error("reference data unavailable: {0}")]
    ReferenceData(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrationError {
    /// Convert a reqwest transport error into the matching variant.
    ///
    /// Timeouts get their own variant so they classify as `TIMEOUT_ERROR`
    /// rather than a generic API failure.
    pub fn transport(system: SystemSide, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MigrationError::Timeout { system }
        } else {
            MigrationError::Transport {
                system,
                message: err.to_string(),
            }
        }
    }

    /// Map an HTTP status + body into the matching variant. 401/403 are
    /// credential failures; everything else non-success is an API error.
    pub fn api(system: SystemSide, status: u16, message: String) -> Self {
        match status {
            401 | 403 => MigrationError::Auth { system },
            _ => MigrationError::Api {
                system,
                status,
                message,
            },
        }
    }

    /// Classify this error into the fixed reporting taxonomy.
    pub fn code(&self) -> ErrorCode {
        match self {
            MigrationError::Validation(_) => ErrorCode::ValidationError,
            MigrationError::Timeout { .. } => ErrorCode::TimeoutError,
            MigrationError::Auth { .. } | MigrationError::Session { .. } => ErrorCode::AuthError,
            MigrationError::Api { status, .. } if *status == 401 || *status == 403 => {
                ErrorCode::AuthError
            }
            MigrationError::Transport { .. }
            | MigrationError::Api { .. }
            | MigrationError::DraftCreation { .. }
            | MigrationError::ReferenceData(_) => ErrorCode::ApiError,
            MigrationError::CompanyMapping(_) => ErrorCode::CompanyMappingError,
            MigrationError::UserMapping(_) => ErrorCode::UserMappingError,
            MigrationError::ActivityType(_) => ErrorCode::ActivityTypeError,
            MigrationError::Attachment { .. } => ErrorCode::AttachmentError,
            MigrationError::Batch(_) => ErrorCode::BatchError,
            MigrationError::Json(_) | MigrationError::Io(_) => ErrorCode::UnknownError,
        }
    }
}
