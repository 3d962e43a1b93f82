use anyhow::{Context, Result};

use towersync::config::Config;
use towersync::storage::RecordStore;

use super::open_store;

/// Delete records every target has accepted
pub async fn purge(config: Config, dry_run: bool) -> Result<()> {
    let store = open_store(&config)?;

    if dry_run {
        let summary = store
            .pending_summary()
            .context("Failed to read pending summary")?;
        let purgeable: usize = summary.kinds.values().map(|k| k.fully_delivered).sum();
        println!("{purgeable} records would be purged");
        return Ok(());
    }

    let removed = store
        .purge_delivered()
        .context("Failed to purge delivered records")?;
    println!("Purged {removed} fully delivered records");
    Ok(())
}
