//! Run tracking: one record per processed entry, rolled up once at the end.
//!
//! Records are append-only. `finalize` stamps the end time and computes the
//! summary exactly once; after that the run is immutable and further
//! tracking calls are dropped with a warning.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::types::ActivityRecord;
use crate::util::format_duration_ms;

/// The audit-trail entry for one processed source activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TrackingRecord {
    #[serde(rename_all = "camelCase")]
    Success {
        entry_id: String,
        target_id: String,
        author_email: String,
        company_name: String,
        subject: String,
        migrated_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Failure {
        entry_id: String,
        reason: String,
        error_code: ErrorCode,
        author_email: String,
        company_name: String,
        subject: String,
        failed_at: DateTime<Utc>,
    },
}

impl TrackingRecord {
    pub fn entry_id(&self) -> &str {
        match self {
            TrackingRecord::Success { entry_id, .. } => entry_id,
            TrackingRecord::Failure { entry_id, .. } => entry_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TrackingRecord::Success { .. })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorStats {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Timing for one processed batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTiming {
    pub author_email: String,
    pub batch_index: usize,
    pub entry_count: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub elapsed_ms: u64,
    /// Message of the fault that aborted this batch, if one did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

/// A fault recorded outside the per-entry flow (page fetch, batch abort).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnexpectedError {
    pub context: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorBreakdown {
    pub author_email: String,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub success_rate: f64,
}

/// Rollup computed once at finalize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_processed: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Percentage, rounded to two decimals.
    pub success_rate: f64,
    pub duration_ms: u64,
    pub duration_formatted: String,
    pub per_author: Vec<AuthorBreakdown>,
    pub error_counts: BTreeMap<ErrorCode, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slowest_batch: Option<BatchTiming>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fastest_batch: Option<BatchTiming>,
}

/// What the thin HTTP layer receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub migration_id: String,
    pub total_processed: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub success_rate: f64,
    pub duration_formatted: String,
    pub per_author_breakdown: Vec<AuthorBreakdown>,
    pub sample_failures: Vec<TrackingRecord>,
    pub sample_successes: Vec<TrackingRecord>,
}

/// The full state of one migration run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRun {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    records: Vec<TrackingRecord>,
    author_stats: BTreeMap<String, AuthorStats>,
    batch_timings: Vec<BatchTiming>,
    unexpected_errors: Vec<UnexpectedError>,
    error_counts: BTreeMap<ErrorCode, u64>,
    summary: Option<RunSummary>,
}

impl MigrationRun {
    pub fn start() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            ended_at: None,
            records: Vec::new(),
            author_stats: BTreeMap::new(),
            batch_timings: Vec::new(),
            unexpected_errors: Vec::new(),
            error_counts: BTreeMap::new(),
            summary: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.summary.is_some()
    }

    pub fn records(&self) -> &[TrackingRecord] {
        &self.records
    }

    pub fn batch_timings(&self) -> &[BatchTiming] {
        &self.batch_timings
    }

    pub fn unexpected_errors(&self) -> &[UnexpectedError] {
        &self.unexpected_errors
    }

    pub fn author_stats(&self) -> &BTreeMap<String, AuthorStats> {
        &self.author_stats
    }

    fn guard_mutation(&self, what: &str) -> bool {
        if self.is_finalized() {
            log::warn!("{} after finalize dropped", what);
            return false;
        }
        true
    }

    pub fn track_success(&mut self, entry: &ActivityRecord, target_id: String) {
        if !self.guard_mutation("track_success") {
            return;
        }
        let stats = self
            .author_stats
            .entry(entry.author.email.clone())
            .or_default();
        stats.processed += 1;
        stats.succeeded += 1;

        self.records.push(TrackingRecord::Success {
            entry_id: entry.id.clone(),
            target_id,
            author_email: entry.author.email.clone(),
            company_name: entry
                .company_context()
                .map(|c| c.lbl.clone())
                .unwrap_or_default(),
            subject: entry.note.subject.clone(),
            migrated_at: Utc::now(),
        });
    }

    pub fn track_failure(&mut self, entry: &ActivityRecord, reason: String, code: ErrorCode) {
        if !self.guard_mutation("track_failure") {
            return;
        }
        let stats = self
            .author_stats
            .entry(entry.author.email.clone())
            .or_default();
        stats.processed += 1;
        stats.failed += 1;
        *self.error_counts.entry(code).or_insert(0) += 1;

        self.records.push(TrackingRecord::Failure {
            entry_id: entry.id.clone(),
            reason,
            error_code: code,
            author_email: entry.author.email.clone(),
            company_name: entry
                .company_context()
                .map(|c| c.lbl.clone())
                .unwrap_or_default(),
            subject: entry.note.subject.clone(),
            failed_at: Utc::now(),
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_batch(
        &mut self,
        author_email: &str,
        batch_index: usize,
        entry_count: usize,
        succeeded: u64,
        failed: u64,
        elapsed_ms: u64,
        aborted: Option<String>,
    ) {
        if !self.guard_mutation("record_batch") {
            return;
        }
        self.batch_timings.push(BatchTiming {
            author_email: author_email.to_string(),
            batch_index,
            entry_count,
            succeeded,
            failed,
            elapsed_ms,
            aborted,
        });
    }

    pub fn record_unexpected(&mut self, context: &str, message: &str) {
        if !self.guard_mutation("record_unexpected") {
            return;
        }
        log::error!("unexpected error in {}: {}", context, message);
        self.unexpected_errors.push(UnexpectedError {
            context: context.to_string(),
            message: message.to_string(),
            at: Utc::now(),
        });
    }

    /// Stamp the end time and compute the summary. Idempotent: repeat calls
    /// return the summary computed the first time.
    pub fn finalize(&mut self) -> &RunSummary {
        if self.summary.is_none() {
            let ended = Utc::now();
            self.ended_at = Some(ended);
            let duration_ms = (ended - self.started_at).num_milliseconds().max(0) as u64;

            let success_count = self.records.iter().filter(|r| r.is_success()).count() as u64;
            let total_processed = self.records.len() as u64;
            let failure_count = total_processed - success_count;

            let per_author = self
                .author_stats
                .iter()
                .map(|(email, stats)| AuthorBreakdown {
                    author_email: email.clone(),
                    processed: stats.processed,
                    succeeded: stats.succeeded,
                    failed: stats.failed,
                    success_rate: percentage(stats.succeeded, stats.processed),
                })
                .collect();

            let slowest_batch = self
                .batch_timings
                .iter()
                .max_by_key(|b| b.elapsed_ms)
                .cloned();
            let fastest_batch = self
                .batch_timings
                .iter()
                .min_by_key(|b| b.elapsed_ms)
                .cloned();

            self.summary = Some(RunSummary {
                total_processed,
                success_count,
                failure_count,
                success_rate: percentage(success_count, total_processed),
                duration_ms,
                duration_formatted: format_duration_ms(duration_ms),
                per_author,
                error_counts: self.error_counts.clone(),
                slowest_batch,
                fastest_batch,
            });
        }
        self.summary.as_ref().expect("summary set above")
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    /// Build the caller-facing report, finalizing first if needed.
    pub fn report(&mut self, sample_limit: usize) -> MigrationReport {
        self.finalize();
        let summary = self.summary.as_ref().expect("finalized above");

        let sample_failures = self
            .records
            .iter()
            .filter(|r| !r.is_success())
            .take(sample_limit)
            .cloned()
            .collect();
        let sample_successes = self
            .records
            .iter()
            .filter(|r| r.is_success())
            .take(sample_limit)
            .cloned()
            .collect();

        MigrationReport {
            migration_id: self.id.clone(),
            total_processed: summary.total_processed,
            success_count: summary.success_count,
            failure_count: summary.failure_count,
            success_rate: summary.success_rate,
            duration_formatted: summary.duration_formatted.clone(),
            per_author_breakdown: summary.per_author.clone(),
            sample_failures,
            sample_successes,
        }
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let raw = (part as f64 / whole as f64) * 100.0;
    (raw * 100.0).round() / 100.0
}
