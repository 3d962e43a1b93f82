//! CLI subcommands and the wiring they share

pub mod import;
pub mod purge;
pub mod status;
pub mod upload;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use towersync::config::Config;
use towersync::storage::SqliteRecordStore;
use towersync::upload::{
    BeaconDbClient, LogProgress, OpenCelliDClient, UploadCoordinator,
};

pub use import::import;
pub use purge::purge;
pub use status::status;
pub use upload::{upload, watch};

/// Load the config file if given, otherwise the environment, and validate it
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Open the record store named in the config
pub fn open_store(config: &Config) -> Result<Arc<SqliteRecordStore>> {
    let store = SqliteRecordStore::new(&config.storage.path).with_context(|| {
        format!(
            "Failed to open record store: {}",
            config.storage.path.display()
        )
    })?;
    Ok(Arc::new(store))
}

/// Coordinator with a client for every enabled target
pub fn build_coordinator(
    config: &Config,
    store: Arc<SqliteRecordStore>,
) -> Result<UploadCoordinator> {
    let mut coordinator = UploadCoordinator::new(store).with_progress(Arc::new(LogProgress));

    if config.opencellid.enabled {
        let client = OpenCelliDClient::new(config.opencellid.clone())
            .context("Failed to create OpenCelliD client")?;
        coordinator = coordinator.with_client(Arc::new(client));
    }

    if config.beacondb.enabled {
        let client = BeaconDbClient::new(config.beacondb.clone())
            .context("Failed to create BeaconDB client")?;
        coordinator = coordinator.with_client(Arc::new(client));
    }

    Ok(coordinator)
}

/// Token cancelled on the first Ctrl+C
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received, cancelling upload");
                trigger.cancel();
            }
            Err(e) => {
                tracing::error!("Failed to wait for Ctrl+C: {}", e);
            }
        }
    });

    token
}
