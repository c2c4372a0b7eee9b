//! Batch scheduling: bounded, ordered, strictly sequential.
//!
//! Entries run one at a time with a fixed inter-entry delay. Sequential
//! processing is deliberate: it keeps per-author sessions warm and avoids
//! rate-limit bursts on either system. A fault escaping the entry migrator
//! fails the faulting entry and everything after it in the batch, so no
//! entry is ever left without a tracking record.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::ErrorCode;
use crate::migrate::entry::EntryMigrator;
use crate::tracker::MigrationRun;
use crate::types::ActivityRecord;

/// Split activities into fixed-size ordered batches; the last may be short.
pub fn partition(activities: Vec<ActivityRecord>, batch_size: usize) -> Vec<Vec<ActivityRecord>> {
    if batch_size == 0 {
        return vec![activities];
    }
    let mut batches = Vec::new();
    let mut current = Vec::with_capacity(batch_size);
    for activity in activities {
        current.push(activity);
        if current.len() == batch_size {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Process one batch sequentially, tracking every entry.
pub async fn process_batch(
    migrator: &mut dyn EntryMigrator,
    batch: &[ActivityRecord],
    batch_index: usize,
    author_email: &str,
    run: &mut MigrationRun,
    entry_delay: Duration,
) {
    let started = Instant::now();
    let mut succeeded: u64 = 0;
    let mut failed: u64 = 0;
    let mut aborted: Option<String> = None;

    for (position, entry) in batch.iter().enumerate() {
        if position > 0 && !entry_delay.is_zero() {
            tokio::time::sleep(entry_delay).await;
        }

        match migrator.migrate(entry).await {
            Ok(outcome) if outcome.success => {
                run.track_success(entry, outcome.target_id.unwrap_or_default());
                succeeded += 1;
            }
            Ok(outcome) => {
                run.track_failure(
                    entry,
                    outcome.reason.unwrap_or_else(|| "unknown failure".into()),
                    outcome.error_code.unwrap_or(ErrorCode::UnknownError),
                );
                failed += 1;
            }
            Err(e) => {
                // Batch-level fault: the faulting entry and every entry not
                // yet processed get a failure record with this message.
                let message = e.to_string();
                log::error!(
                    "batch {} for {} aborted at position {}: {}",
                    batch_index,
                    author_email,
                    position,
                    message
                );
                for remaining in &batch[position..] {
                    run.track_failure(
                        remaining,
                        format!("batch aborted: {}", message),
                        ErrorCode::BatchError,
                    );
                    failed += 1;
                }
                run.record_unexpected(
                    &format!("batch {} for {}", batch_index, author_email),
                    &message,
                );
                aborted = Some(message);
                break;
            }
        }
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    run.record_batch(
        author_email,
        batch_index,
        batch.len(),
        succeeded,
        failed,
        elapsed_ms,
        aborted,
    );
    log::info!(
        "batch {} for {}: {} ok, {} failed in {} ms",
        batch_index,
        author_email,
        succeeded,
        failed,
        elapsed_ms
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrationError;
    use crate::migrate::entry::EntryOutcome;
    use crate::types::Author;
    use async_trait::async_trait;

    fn entries(count: usize) -> Vec<ActivityRecord> {
        (0..count)
            .map(|i| ActivityRecord {
                id: format!("act-{}", i),
                author: Author {
                    name: "Sarah Chen".into(),
                    email: "sarah.chen@vendor.com".into(),
                },
                ..Default::default()
            })
            .collect()
    }

    /// Succeeds until `fail_after` entries, then returns a batch-level fault.
    struct ScriptedMigrator {
        processed: usize,
        fail_after: Option<usize>,
        fail_entry_ids: Vec<String>,
    }

    impl ScriptedMigrator {
        fn succeeding() -> Self {
            Self {
                processed: 0,
                fail_after: None,
                fail_entry_ids: Vec::new(),
            }
        }

        fn faulting_after(n: usize) -> Self {
            Self {
                processed: 0,
                fail_after: Some(n),
                fail_entry_ids: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl EntryMigrator for ScriptedMigrator {
        async fn migrate(
            &mut self,
            entry: &ActivityRecord,
        ) -> Result<EntryOutcome, MigrationError> {
            if let Some(limit) = self.fail_after {
                if self.processed >= limit {
                    return Err(MigrationError::Batch("session store corrupted".into()));
                }
            }
            self.processed += 1;
            if self.fail_entry_ids.contains(&entry.id) {
                return Ok(EntryOutcome::failure(
                    &entry.id,
                    "no target company".into(),
                    crate::error::ErrorCode::CompanyMappingError,
                ));
            }
            Ok(EntryOutcome::success(&entry.id, format!("tgt-{}", entry.id)))
        }
    }

    #[test]
    fn test_partition_45_by_20() {
        let batches = partition(entries(45), 20);
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![20, 20, 5]);
        // Order is preserved across the split
        assert_eq!(batches[0][0].id, "act-0");
        assert_eq!(batches[2][4].id, "act-44");
    }

    #[test]
    fn test_partition_exact_multiple() {
        let batches = partition(entries(40), 20);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 20));
    }

    #[test]
    fn test_partition_empty_and_degenerate() {
        assert!(partition(entries(0), 20).is_empty());
        // batch_size 0 keeps everything in one batch rather than looping
        let batches = partition(entries(3), 0);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
    }

    #[tokio::test]
    async fn test_batch_success_counts() {
        let batch = entries(5);
        let mut migrator = ScriptedMigrator::succeeding();
        let mut run = MigrationRun::start();

        process_batch(
            &mut migrator,
            &batch,
            0,
            "sarah.chen@vendor.com",
            &mut run,
            Duration::ZERO,
        )
        .await;

        let summary = run.finalize();
        assert_eq!(summary.total_processed, 5);
        assert_eq!(summary.success_count, 5);
        assert_eq!(summary.failure_count, 0);
    }

    #[tokio::test]
    async fn test_fault_after_two_fails_remaining_three() {
        let batch = entries(5);
        let mut migrator = ScriptedMigrator::faulting_after(2);
        let mut run = MigrationRun::start();

        process_batch(
            &mut migrator,
            &batch,
            0,
            "sarah.chen@vendor.com",
            &mut run,
            Duration::ZERO,
        )
        .await;

        let summary = run.finalize().clone();
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count, 3);
        assert_eq!(summary.total_processed, 5);

        // Every entry has exactly one record
        for i in 0..5 {
            let id = format!("act-{}", i);
            assert_eq!(
                run.records().iter().filter(|r| r.entry_id() == id).count(),
                1
            );
        }
        // The remaining entries carry the batch error code
        assert_eq!(summary.error_counts[&ErrorCode::BatchError], 3);
        // Timing recorded the abort
        assert!(run.batch_timings()[0].aborted.is_some());
    }

    #[tokio::test]
    async fn test_entry_failures_do_not_abort_batch() {
        let batch = entries(4);
        let mut migrator = ScriptedMigrator::succeeding();
        migrator.fail_entry_ids = vec!["act-1".into(), "act-2".into()];
        let mut run = MigrationRun::start();

        process_batch(
            &mut migrator,
            &batch,
            0,
            "sarah.chen@vendor.com",
            &mut run,
            Duration::ZERO,
        )
        .await;

        let summary = run.finalize();
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count, 2);
        assert_eq!(
            summary.error_counts[&ErrorCode::CompanyMappingError],
            2
        );
        // No abort: all four entries were attempted
        assert!(run.batch_timings()[0].aborted.is_none());
    }
}
