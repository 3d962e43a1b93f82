//! Durable storage of captured survey records
//!
//! Records live in one SQLite table per kind. Each row carries one delivery
//! flag per upload target; a flag only ever moves from unset to set, so a
//! record is re-sent to a target until that target accepts it.

mod repository;
mod schema;

pub use repository::{KindSummary, PendingSummary, RecordStore, SqliteRecordStore, TargetSelector};
