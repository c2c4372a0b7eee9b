//! Source system integration.
//!
//! Read-only: paginated activity history by author, milestone-type
//! category lists, and raw attachment bytes. Nothing here mutates the
//! source system.

mod client;

pub use client::SourceClient;
