//! Durable run artifacts.
//!
//! Three write-once JSON files per run under `{artifact_dir}/{run_id}/`:
//! the full run record, its summary, and the per-author breakdown. Writes
//! are atomic (temp sibling + rename) for crash safety. Persistence
//! failures are the caller's to log; they never abort a run.

use std::path::{Path, PathBuf};

use crate::error::MigrationError;
use crate::tracker::MigrationRun;
use crate::util::{atomic_write_str, sanitize_id};

/// Persist the run record, summary, and author breakdown.
///
/// Returns the directory the artifacts were written to.
pub fn persist_run(run: &MigrationRun, artifact_dir: &Path) -> Result<PathBuf, MigrationError> {
    let run_dir = artifact_dir.join(sanitize_id(&run.id));
    std::fs::create_dir_all(&run_dir)?;

    write_json(&run_dir.join("run.json"), run)?;

    if let Some(summary) = run.summary() {
        write_json(&run_dir.join("summary.json"), summary)?;
        write_json(&run_dir.join("authors.json"), &summary.per_author)?;
    } else {
        // Persisting an unfinalized run still captures the records; the
        // rollup files are simply absent.
        log::warn!("persisting run {} without a summary", run.id);
    }

    Ok(run_dir)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), MigrationError> {
    let json = serde_json::to_string_pretty(value)?;
    atomic_write_str(path, &json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::{ActivityRecord, Author};

    fn tracked_run() -> MigrationRun {
        let mut run = MigrationRun::start();
        let entry = ActivityRecord {
            id: "act-1".into(),
            author: Author {
                name: "Sarah Chen".into(),
                email: "sarah.chen@vendor.com".into(),
            },
            ..Default::default()
        };
        run.track_success(&entry, "tgt-1".into());
        let failing = ActivityRecord {
            id: "act-2".into(),
            ..entry.clone()
        };
        run.track_failure(&failing, "boom".into(), ErrorCode::ApiError);
        run
    }

    #[test]
    fn test_persist_writes_three_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut run = tracked_run();
        run.finalize();

        let run_dir = persist_run(&run, dir.path()).expect("persist");

        assert!(run_dir.join("run.json").exists());
        assert!(run_dir.join("summary.json").exists());
        assert!(run_dir.join("authors.json").exists());

        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("summary.json")).unwrap())
                .unwrap();
        assert_eq!(summary["totalProcessed"], 2);
        assert_eq!(summary["successCount"], 1);

        let authors: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("authors.json")).unwrap())
                .unwrap();
        assert_eq!(authors[0]["authorEmail"], "sarah.chen@vendor.com");
    }

    #[test]
    fn test_persist_run_record_contains_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut run = tracked_run();
        run.finalize();

        let run_dir = persist_run(&run, dir.path()).expect("persist");
        let record: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("run.json")).unwrap())
                .unwrap();
        assert_eq!(record["records"].as_array().unwrap().len(), 2);
        assert_eq!(record["records"][1]["errorCode"], "API_ERROR");
    }

    #[test]
    fn test_persist_unfinalized_run_skips_rollups() {
        let dir = tempfile::tempdir().expect("tempdir");
        let run = tracked_run();

        let run_dir = persist_run(&run, dir.path()).expect("persist");
        assert!(run_dir.join("run.json").exists());
        assert!(!run_dir.join("summary.json").exists());
    }
}
