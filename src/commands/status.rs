use anyhow::{Context, Result};

use towersync::config::Config;
use towersync::models::UploadTarget;
use towersync::storage::RecordStore;

use super::open_store;

/// Show pending record counts per kind and target
pub async fn status(config: Config, json: bool) -> Result<()> {
    let store = open_store(&config)?;
    let summary = store
        .pending_summary()
        .context("Failed to read pending summary")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Record store: {}", config.storage.path.display());
    println!();
    println!(
        "{:<6} {:>8} {:>12} {:>10} {:>10}",
        "kind", "total", "opencellid", "beacondb", "purgeable"
    );
    for (kind, counts) in &summary.kinds {
        println!(
            "{:<6} {:>8} {:>12} {:>10} {:>10}",
            kind.as_str(),
            counts.total,
            counts.pending.get(&UploadTarget::OpenCelliD).copied().unwrap_or(0),
            counts.pending.get(&UploadTarget::BeaconDb).copied().unwrap_or(0),
            counts.fully_delivered
        );
    }
    println!();
    println!("Total records: {}", summary.total());
    for target in UploadTarget::ALL {
        let enabled = match target {
            UploadTarget::OpenCelliD => config.opencellid.enabled,
            UploadTarget::BeaconDb => config.beacondb.enabled,
        };
        println!(
            "Pending for {}: {}{}",
            target.display_name(),
            summary.pending_for(target),
            if enabled { "" } else { " (disabled)" }
        );
    }

    Ok(())
}
