//! The migration pipeline.
//!
//! - `payload`: assembles the target-shaped create body
//! - `entry`: per-entry resolve → relay → draft → commit flow
//! - `batch`: sequential batch scheduling with failure containment
//! - `orchestrate`: the per-author run loop and the public entry point

pub mod batch;
pub mod entry;
pub mod orchestrate;
pub mod payload;

pub use entry::{EngineContext, EntryMigrator, EntryOutcome};
pub use orchestrate::run_migration;
