//! Per-entry migration: resolve, relay, draft, commit.
//!
//! The entry boundary is the failure boundary. Everything that can go wrong
//! for one activity is converted into a failure outcome here; only faults in
//! the machinery itself (surfaced as `Err`) escape to the batch scheduler,
//! which fails the rest of the batch.

use std::time::Duration;

use async_trait::async_trait;

use crate::attachments::{relay_attachments, AttachmentOwner};
use crate::config::RunSettings;
use crate::error::{ErrorCode, MigrationError};
use crate::mapping::MappingCache;
use crate::migrate::payload::{build_payload, ResolvedIdentities};
use crate::session::SessionManager;
use crate::source::SourceClient;
use crate::target::TargetClient;
use crate::types::ActivityRecord;

/// Result of migrating one entry. Either shape accounts for the entry
/// exactly once.
#[derive(Debug, Clone)]
pub struct EntryOutcome {
    pub success: bool,
    pub entry_id: String,
    pub target_id: Option<String>,
    pub reason: Option<String>,
    pub error_code: Option<ErrorCode>,
}

impl EntryOutcome {
    pub fn success(entry_id: &str, target_id: String) -> Self {
        Self {
            success: true,
            entry_id: entry_id.to_string(),
            target_id: Some(target_id),
            reason: None,
            error_code: None,
        }
    }

    pub fn failure(entry_id: &str, reason: String, code: ErrorCode) -> Self {
        Self {
            success: false,
            entry_id: entry_id.to_string(),
            target_id: None,
            reason: Some(reason),
            error_code: Some(code),
        }
    }
}

/// Seam between the batch scheduler and the entry flow. The engine is the
/// production implementation; scripted doubles drive the scheduler tests.
#[async_trait]
pub trait EntryMigrator: Send {
    async fn migrate(&mut self, entry: &ActivityRecord) -> Result<EntryOutcome, MigrationError>;
}

/// Owns every collaborator the per-entry flow needs. One instance per run.
pub struct EngineContext {
    pub source: SourceClient,
    pub target: TargetClient,
    pub sessions: SessionManager,
    pub cache: MappingCache,
    pub settings: RunSettings,
}

#[async_trait]
impl EntryMigrator for EngineContext {
    async fn migrate(&mut self, entry: &ActivityRecord) -> Result<EntryOutcome, MigrationError> {
        Ok(self.migrate_inner(entry).await)
    }
}

impl EngineContext {
    async fn migrate_inner(&mut self, entry: &ActivityRecord) -> EntryOutcome {
        // Company resolution is the one hard mapping requirement. No
        // context or no target company fails the entry before anything
        // else is attempted.
        let Some(company_ctx) = entry.company_context() else {
            return EntryOutcome::failure(
                &entry.id,
                "activity has no company context".to_string(),
                ErrorCode::CompanyMappingError,
            );
        };

        let company_id = match self.cache.resolve_company(&self.target, &company_ctx.lbl).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                return EntryOutcome::failure(
                    &entry.id,
                    format!("no target company for '{}'", company_ctx.lbl),
                    ErrorCode::CompanyMappingError,
                );
            }
            Err(e) => return EntryOutcome::failure(&entry.id, e.to_string(), e.code()),
        };

        let author_user_id = match self.cache.resolve_user(&self.target, &entry.author.email).await
        {
            Ok(id) => id,
            Err(e) => return EntryOutcome::failure(&entry.id, e.to_string(), e.code()),
        };

        // Attendee gaps are cosmetic; an unresolvable attendee is dropped.
        let mut internal_attendee_ids = Vec::new();
        for email in &entry.note.internal_attendees {
            match self.cache.resolve_user(&self.target, email).await {
                Ok(id) => {
                    if !internal_attendee_ids.contains(&id) {
                        internal_attendee_ids.push(id);
                    }
                }
                Err(e) => log::warn!("dropping attendee {} on {}: {}", email, entry.id, e),
            }
        }

        let activity_type = self
            .cache
            .resolve_activity_type(&self.target, &entry.note.note_type, &company_id)
            .await;

        let milestone_type_id = match entry.milestone_type_id() {
            Some(milestone_id) => {
                self.cache
                    .resolve_milestone_type(
                        &self.source,
                        &self.target,
                        milestone_id,
                        &company_ctx.id,
                        &company_id,
                    )
                    .await
            }
            None => None,
        };

        let session = self
            .sessions
            .session_for(&entry.author.email, &self.target)
            .await;

        let owner = AttachmentOwner {
            company_id: &company_id,
            company_label: &company_ctx.lbl,
            user_id: &author_user_id,
            user_name: &entry.author.name,
            user_email: &entry.author.email,
        };
        let attachments = relay_attachments(
            &self.source,
            &self.target,
            &entry.attachments,
            &owner,
            &session,
            Duration::from_millis(self.settings.attachment_delay_ms),
        )
        .await;

        let resolved = ResolvedIdentities {
            author_user_id,
            company_id,
            company_label: company_ctx.lbl.clone(),
            activity_type,
            milestone_type_id,
            internal_attendee_ids,
            attachments,
        };
        let payload = build_payload(entry, &resolved);

        // Two-phase create. A failed draft means the commit is never
        // attempted; a failed commit leaves the draft behind for target-side
        // cleanup rather than re-sending.
        let draft_id = match self.target.create_draft(&payload, &session).await {
            Ok(id) => id,
            Err(e) => {
                return EntryOutcome::failure(
                    &entry.id,
                    format!("draft creation failed: {}", e),
                    e.code(),
                );
            }
        };

        match self.target.commit_activity(&draft_id, &payload, &session).await {
            Ok(final_id) => {
                log::info!("migrated {} as {}", entry.id, final_id);
                EntryOutcome::success(&entry.id, final_id)
            }
            Err(e) => EntryOutcome::failure(
                &entry.id,
                format!("commit failed for draft {}: {}", draft_id, e),
                e.code(),
            ),
        }
    }
}
