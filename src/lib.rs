//! backhaul: engagement history migration engine.
//!
//! Moves historical activity records (notes, meetings, attachments) from a
//! source record-keeping system into a target one. Identity and taxonomy
//! schemas are reconciled through a per-run mapping cache, attachments are
//! relayed as opaque bytes, records are created through the target's
//! draft-commit protocol under per-author impersonation sessions, and every
//! source entry is accounted for exactly once in a persisted run record.
//!
//! Entry point: [`run_migration`]. Everything else is plumbing it owns:
//! system clients (`source`, `target`), the mapping cache (`mapping`),
//! session management (`session`), the attachment relay (`attachments`),
//! the batched pipeline (`migrate`), and run tracking (`tracker`,
//! `artifacts`).

pub mod artifacts;
pub mod attachments;
pub mod config;
pub mod error;
pub mod mapping;
pub mod migrate;
pub mod retry;
pub mod session;
pub mod source;
pub mod target;
pub mod tracker;
pub mod types;
pub mod util;

pub use crate::config::{RunConfig, RunSettings};
pub use crate::error::{ErrorCode, MigrationError};
pub use crate::migrate::run_migration;
pub use crate::session::{DisabledSessionBroker, HttpSessionBroker, SessionBroker};
pub use crate::tracker::{MigrationReport, MigrationRun, TrackingRecord};
