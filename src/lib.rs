//! towersync - Reliable multi-target upload of radio survey records
//!
//! Captured cellular and Wi-Fi observations are kept in a local SQLite store
//! and delivered in batches to independent public registries. Each record
//! carries one delivery flag per registry, so a partial failure never causes
//! a record to be re-sent to a registry that already accepted it.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Survey record kinds, upload targets and batches
//! - [`storage`] - SQLite record store with per-target delivery flags
//! - [`upload`] - Target clients, outcome aggregation and the upload coordinator
//! - [`scheduler`] - Periodic runs with retry backoff
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use towersync::config::Config;
//! use towersync::storage::SqliteRecordStore;
//! use towersync::upload::{BeaconDbClient, UploadCoordinator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = Arc::new(SqliteRecordStore::new(&config.storage.path)?);
//!     let coordinator = UploadCoordinator::new(store)
//!         .with_client(Arc::new(BeaconDbClient::new(config.beacondb.clone())?));
//!
//!     let report = coordinator
//!         .run(&config.upload_config(), &CancellationToken::new())
//!         .await?;
//!     println!("{}", report.disposition);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod storage;
pub mod upload;
pub mod utils;

#[cfg(test)]
mod test_support;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{RecordBatch, RecordKind, StoredRecord, SurveyRecord, UploadTarget};
    pub use crate::scheduler::UploadScheduler;
    pub use crate::storage::{RecordStore, SqliteRecordStore, TargetSelector};
    pub use crate::upload::{
        Disposition, ResultBundle, RunReport, TargetClient, UploadConfig, UploadCoordinator,
        UploadOutcome,
    };
}

// Direct re-exports for convenience
pub use models::{RecordKind, SurveyRecord, UploadTarget};
pub use scheduler::UploadScheduler;
