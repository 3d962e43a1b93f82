//! Multi-target upload pipeline
//!
//! # Architecture
//!
//! - [`TargetClient`] - one implementation per registry, returns an [`UploadOutcome`]
//! - [`ResultBundle`] - per-target outcomes merged by severity
//! - [`UploadCoordinator`] - batches pending records and fans them out to the clients
//! - [`ProgressReporter`] - fire-and-forget progress sink

pub mod beacondb;
pub mod bundle;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod opencellid;
pub mod outcome;
pub mod progress;

pub use beacondb::{BeaconDbClient, BeaconDbConfig};
pub use bundle::ResultBundle;
pub use client::{classify_status, TargetClient};
pub use config::{TargetSettings, UploadConfig, UploadConfigBuilder};
pub use coordinator::{Disposition, RunReport, UploadCoordinator};
pub use opencellid::{OpenCelliDClient, OpenCelliDConfig};
pub use outcome::{OutcomeClass, UploadOutcome};
pub use progress::{ChannelProgress, FnProgress, LogProgress, NoProgress, ProgressReporter, ProgressUpdate};
