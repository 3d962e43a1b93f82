use anyhow::{Context, Result};
use std::io::BufRead;
use std::path::Path;

use towersync::config::Config;
use towersync::models::SurveyRecord;
use towersync::storage::RecordStore;

use super::open_store;

const IMPORT_CHUNK: usize = 500;

/// Import newline-delimited JSON records; `-` reads standard input
pub async fn import(config: Config, input: &Path) -> Result<()> {
    let store = open_store(&config)?;

    let reader: Box<dyn BufRead> = if input == Path::new("-") {
        Box::new(std::io::stdin().lock())
    } else {
        let file = std::fs::File::open(input)
            .with_context(|| format!("Failed to open {}", input.display()))?;
        Box::new(std::io::BufReader::new(file))
    };

    let mut chunk: Vec<SurveyRecord> = Vec::with_capacity(IMPORT_CHUNK);
    let mut imported = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", index + 1))?;
        if line.trim().is_empty() {
            continue;
        }

        let record: SurveyRecord = serde_json::from_str(&line)
            .with_context(|| format!("Invalid record on line {}", index + 1))?;
        chunk.push(record);

        if chunk.len() == IMPORT_CHUNK {
            imported += store.insert(&chunk).context("Failed to store records")?.len();
            chunk.clear();
        }
    }

    if !chunk.is_empty() {
        imported += store.insert(&chunk).context("Failed to store records")?.len();
    }

    tracing::info!(records = imported, "Import finished");
    println!("Imported {imported} records into {}", config.storage.path.display());
    Ok(())
}
