//! Run orchestration: authors in, report out.
//!
//! For each configured author the orchestrator pulls the complete source
//! history (paginated), partitions it into batches, and drives the batch
//! scheduler. Faults are contained per author; the only run-aborting
//! conditions are input validation and missing minimal reference data.
//! finalize + persist always run on whatever was tracked.

use std::time::Duration;

use crate::artifacts;
use crate::config::RunSettings;
use crate::error::MigrationError;
use crate::mapping::MappingCache;
use crate::migrate::batch::{partition, process_batch};
use crate::migrate::entry::EngineContext;
use crate::session::{SessionBroker, SessionManager};
use crate::source::SourceClient;
use crate::target::TargetClient;
use crate::tracker::{MigrationReport, MigrationRun};
use crate::types::{ActivityRecord, AuthorSpec, SourceConnection, TargetConnection};

/// Migrate the complete activity history of every configured author.
///
/// Returns `Err` only for rejected inputs or unusable reference data, both
/// detected before any entry is processed. Once processing starts the caller
/// always gets a report, partial failures included.
pub async fn run_migration(
    source_conn: &SourceConnection,
    target_conn: &TargetConnection,
    authors: &[AuthorSpec],
    broker: Box<dyn SessionBroker>,
    settings: RunSettings,
) -> Result<MigrationReport, MigrationError> {
    validate_inputs(source_conn, target_conn, authors)?;

    let timeout = Duration::from_secs(settings.request_timeout_secs);
    let source = SourceClient::new(source_conn, timeout)?;
    let target = TargetClient::new(target_conn, timeout)?;

    // Minimal reference data. The probe identifies the system user (the
    // fallback for unmapped authors); an empty company directory would make
    // every entry unmappable, so the run refuses to start.
    let profile = target.current_profile(None).await.map_err(|e| {
        MigrationError::ReferenceData(format!("target profile probe failed: {}", e))
    })?;
    let first_companies = target.companies_page(0, 1).await.map_err(|e| {
        MigrationError::ReferenceData(format!("target company directory unavailable: {}", e))
    })?;
    if first_companies.content.is_empty() {
        return Err(MigrationError::ReferenceData(
            "target company directory is empty".to_string(),
        ));
    }

    let mut engine = EngineContext {
        source,
        target,
        sessions: SessionManager::new(broker, target_conn.api_token.clone()),
        cache: MappingCache::new(profile.id, settings.page_size),
        settings: settings.clone(),
    };

    let mut run = MigrationRun::start();
    log::info!(
        "migration {} started: {} authors, batch size {}",
        run.id,
        authors.len(),
        settings.batch_size
    );

    for (index, author) in authors.iter().enumerate() {
        if index > 0 && settings.cache_clear_interval > 0 && index % settings.cache_clear_interval == 0
        {
            engine.cache.clear();
            log::info!("mapping caches cleared after {} authors", index);
        }

        let activities =
            match fetch_author_history(&engine.source, &author.email, settings.page_size).await {
                Ok(activities) => activities,
                Err(e) => {
                    run.record_unexpected(
                        &format!("history fetch for {}", author.email),
                        &e.to_string(),
                    );
                    continue;
                }
            };

        if activities.is_empty() {
            log::info!("{} has no activities, skipping", author.email);
            continue;
        }

        log::info!("{}: {} activities to migrate", author.email, activities.len());
        let entry_delay = Duration::from_millis(settings.entry_delay_ms);
        for (batch_index, batch) in partition(activities, settings.batch_size).iter().enumerate() {
            process_batch(
                &mut engine,
                batch,
                batch_index,
                &author.email,
                &mut run,
                entry_delay,
            )
            .await;
        }
    }

    let summary = run.finalize();
    log::info!(
        "migration finished: {}/{} succeeded in {}",
        summary.success_count,
        summary.total_processed,
        summary.duration_formatted
    );

    if let Err(e) = artifacts::persist_run(&run, &settings.artifact_dir) {
        log::warn!("artifact persistence failed (run continues): {}", e);
    }

    Ok(run.report(settings.sample_limit))
}

/// Pull every page of one author's history, in source order.
async fn fetch_author_history(
    source: &SourceClient,
    author_email: &str,
    page_size: u32,
) -> Result<Vec<ActivityRecord>, MigrationError> {
    let mut all = Vec::new();
    let mut page = 0;
    loop {
        let resp = source.fetch_activities(author_email, page, page_size).await?;
        let total_pages = resp.page.total_pages;
        all.extend(resp.content);
        page += 1;
        if total_pages == 0 || page >= total_pages {
            break;
        }
    }
    Ok(all)
}

fn validate_inputs(
    source: &SourceConnection,
    target: &TargetConnection,
    authors: &[AuthorSpec],
) -> Result<(), MigrationError> {
    if source.base_url.trim().is_empty() {
        return Err(MigrationError::Validation("source baseUrl is required".into()));
    }
    if source.api_token.trim().is_empty() {
        return Err(MigrationError::Validation("source apiToken is required".into()));
    }
    if target.base_url.trim().is_empty() {
        return Err(MigrationError::Validation("target baseUrl is required".into()));
    }
    if target.api_token.trim().is_empty() {
        return Err(MigrationError::Validation("target apiToken is required".into()));
    }
    if authors.is_empty() {
        return Err(MigrationError::Validation(
            "at least one author is required".into(),
        ));
    }
    if let Some(author) = authors.iter().find(|a| a.email.trim().is_empty()) {
        return Err(MigrationError::Validation(format!(
            "author '{}' has no email",
            author.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::migrate::entry::{EntryMigrator, EntryOutcome};
    use crate::types::Author;
    use async_trait::async_trait;

    fn connections() -> (SourceConnection, TargetConnection) {
        (
            SourceConnection {
                base_url: "https://old.example.com".into(),
                api_token: "src".into(),
            },
            TargetConnection {
                base_url: "https://new.example.com".into(),
                api_token: "tgt".into(),
            },
        )
    }

    fn author() -> AuthorSpec {
        AuthorSpec {
            name: "Sarah Chen".into(),
            email: "sarah.chen@vendor.com".into(),
        }
    }

    #[test]
    fn test_validate_rejects_missing_inputs() {
        let (source, target) = connections();

        let empty_source = SourceConnection::default();
        assert!(matches!(
            validate_inputs(&empty_source, &target, &[author()]),
            Err(MigrationError::Validation(_))
        ));

        assert!(matches!(
            validate_inputs(&source, &target, &[]),
            Err(MigrationError::Validation(_))
        ));

        let nameless = AuthorSpec {
            name: "Ghost".into(),
            email: "  ".into(),
        };
        assert!(matches!(
            validate_inputs(&source, &target, &[nameless]),
            Err(MigrationError::Validation(_))
        ));

        assert!(validate_inputs(&source, &target, &[author()]).is_ok());
    }

    struct AlwaysSucceeds;

    #[async_trait]
    impl EntryMigrator for AlwaysSucceeds {
        async fn migrate(
            &mut self,
            entry: &ActivityRecord,
        ) -> Result<EntryOutcome, MigrationError> {
            Ok(EntryOutcome::success(&entry.id, format!("tgt-{}", entry.id)))
        }
    }

    // 45 activities at batch size 20 → batches of (20, 20, 5) and a
    // per-author processed count of 45.
    #[tokio::test]
    async fn test_author_history_processed_across_batches() {
        let activities: Vec<ActivityRecord> = (0..45)
            .map(|i| ActivityRecord {
                id: format!("act-{}", i),
                author: Author {
                    name: "Sarah Chen".into(),
                    email: "sarah.chen@vendor.com".into(),
                },
                ..Default::default()
            })
            .collect();

        let batches = partition(activities, 20);
        assert_eq!(
            batches.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![20, 20, 5]
        );

        let mut run = MigrationRun::start();
        let mut migrator = AlwaysSucceeds;
        for (batch_index, batch) in batches.iter().enumerate() {
            process_batch(
                &mut migrator,
                batch,
                batch_index,
                "sarah.chen@vendor.com",
                &mut run,
                Duration::ZERO,
            )
            .await;
        }

        let stats = &run.author_stats()["sarah.chen@vendor.com"];
        assert_eq!(stats.processed, 45);
        assert_eq!(stats.succeeded, 45);
        assert_eq!(run.batch_timings().len(), 3);

        let report = run.report(10);
        assert_eq!(report.total_processed, 45);
        assert_eq!(
            report.success_count + report.failure_count,
            report.total_processed
        );
    }

    struct AlwaysFails;

    #[async_trait]
    impl EntryMigrator for AlwaysFails {
        async fn migrate(
            &mut self,
            entry: &ActivityRecord,
        ) -> Result<EntryOutcome, MigrationError> {
            Ok(EntryOutcome::failure(
                &entry.id,
                "no target company for 'Vanished Inc'".into(),
                ErrorCode::CompanyMappingError,
            ))
        }
    }

    #[tokio::test]
    async fn test_report_always_structured_even_on_total_failure() {
        let activities: Vec<ActivityRecord> = (0..3)
            .map(|i| ActivityRecord {
                id: format!("act-{}", i),
                author: Author {
                    name: "Sarah Chen".into(),
                    email: "sarah.chen@vendor.com".into(),
                },
                ..Default::default()
            })
            .collect();

        let mut run = MigrationRun::start();
        let mut migrator = AlwaysFails;
        for (batch_index, batch) in partition(activities, 20).iter().enumerate() {
            process_batch(
                &mut migrator,
                batch,
                batch_index,
                "sarah.chen@vendor.com",
                &mut run,
                Duration::ZERO,
            )
            .await;
        }

        let report = run.report(2);
        assert_eq!(report.failure_count, 3);
        assert_eq!(report.success_rate, 0.0);
        assert_eq!(report.sample_failures.len(), 2);
        assert!(report.sample_successes.is_empty());
    }
}
