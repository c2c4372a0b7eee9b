//! Run configuration.
//!
//! Loaded from a JSON file by the CLI; every tuning knob has a serde default
//! so older config files keep working as fields are added.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MigrationError;
use crate::types::{AuthorSpec, SourceConnection, TargetConnection};

/// Tuning knobs for a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSettings {
    /// Entries per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Page size for source history and target directory pagination.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Delay between entries within a batch (rate-limit safety).
    #[serde(default = "default_entry_delay_ms")]
    pub entry_delay_ms: u64,
    /// Delay between attachment uploads.
    #[serde(default = "default_attachment_delay_ms")]
    pub attachment_delay_ms: u64,
    /// Mapping caches are cleared after every N authors and rebuilt lazily,
    /// trading latency for bounded memory on long author lists.
    #[serde(default = "default_cache_clear_interval")]
    pub cache_clear_interval: usize,
    /// Fixed timeout applied to every remote call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Where run artifacts (run.json, summary.json, authors.json) land.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    /// Cap on sample successes/failures included in the report.
    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,
}

fn default_batch_size() -> usize {
    20
}

fn default_page_size() -> u32 {
    50
}

fn default_entry_delay_ms() -> u64 {
    500
}

fn default_attachment_delay_ms() -> u64 {
    300
}

fn default_cache_clear_interval() -> usize {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_artifact_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".backhaul")
        .join("runs")
}

fn default_sample_limit() -> usize {
    10
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            page_size: default_page_size(),
            entry_delay_ms: default_entry_delay_ms(),
            attachment_delay_ms: default_attachment_delay_ms(),
            cache_clear_interval: default_cache_clear_interval(),
            request_timeout_secs: default_request_timeout_secs(),
            artifact_dir: default_artifact_dir(),
            sample_limit: default_sample_limit(),
        }
    }
}

/// A full run configuration as loaded from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub source: SourceConnection,
    pub target: TargetConnection,
    pub authors: Vec<AuthorSpec>,
    /// Browser-automation collaborator endpoint for per-author sessions.
    /// Absent means every entry falls back to the generic credential.
    #[serde(default)]
    pub automation_url: Option<String>,
    #[serde(default)]
    pub settings: RunSettings,
}

/// Load a run configuration from a JSON file.
pub fn load_config(path: &Path) -> Result<RunConfig, MigrationError> {
    let content = std::fs::read_to_string(path)?;
    let config: RunConfig = serde_json::from_str(&content)
        .map_err(|e| MigrationError::Validation(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings: RunSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.batch_size, 20);
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.cache_clear_interval, 5);
        assert_eq!(settings.request_timeout_secs, 30);
        assert_eq!(settings.sample_limit, 10);
    }

    #[test]
    fn test_settings_partial_override() {
        let settings: RunSettings =
            serde_json::from_str(r#"{"batchSize": 5, "entryDelayMs": 0}"#).unwrap();
        assert_eq!(settings.batch_size, 5);
        assert_eq!(settings.entry_delay_ms, 0);
        assert_eq!(settings.attachment_delay_ms, 300);
    }

    #[test]
    fn test_config_minimal() {
        let json = r#"{
            "source": {"baseUrl": "https://old.example.com", "apiToken": "src-tok"},
            "target": {"baseUrl": "https://new.example.com", "apiToken": "tgt-tok"},
            "authors": [{"name": "Sarah Chen", "email": "sarah.chen@vendor.com"}]
        }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.authors.len(), 1);
        assert!(config.automation_url.is_none());
        assert_eq!(config.settings.batch_size, 20);
    }

    #[test]
    fn test_load_config_rejects_bad_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, MigrationError::Validation(_)));
    }
}
