use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use towersync::config::Config;
use towersync::upload::{Disposition, RunReport};
use towersync::UploadScheduler;

use super::{build_coordinator, open_store, shutdown_token};

fn scheduler(config: &Config) -> Result<UploadScheduler> {
    let store = open_store(config)?;
    let coordinator = build_coordinator(config, store)?;

    Ok(
        UploadScheduler::new(Arc::new(coordinator), config.upload_config())
            .with_retry(config.retry_config().with_jitter(0.1))
            .with_interval(config.interval()),
    )
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Upload {} ({})", report.disposition, report.run_id);
    println!(
        "  Batches: {}/{}",
        report.batches_completed, report.batches_planned
    );
    for (target, message, description) in report.target_messages() {
        println!(
            "  {:<11} {} ({} records): {}",
            target.display_name(),
            message,
            report.delivered_to(target),
            description
        );
    }
    println!(
        "  Duration: {:.1}s",
        report.duration().num_milliseconds() as f64 / 1000.0
    );
    Ok(())
}

/// Run one upload, optionally retrying with backoff
pub async fn upload(config: Config, retry: bool, json: bool) -> Result<()> {
    let scheduler = scheduler(&config)?;
    let token = shutdown_token();

    let report = if retry {
        scheduler.run_with_retries(&token).await
    } else {
        scheduler.run_once(&token).await
    };

    print_report(&report, json)?;

    if report.disposition == Disposition::Failed {
        anyhow::bail!("Upload failed: {}", report.results.worst().message());
    }
    Ok(())
}

/// Upload on a fixed interval until Ctrl+C
pub async fn watch(config: Config, interval: Option<u64>, json: bool) -> Result<()> {
    let mut scheduler = scheduler(&config)?;
    if let Some(secs) = interval {
        scheduler = scheduler.with_interval(Duration::from_secs(secs.max(1)));
    }
    let token = shutdown_token();

    let mut print_error = None;
    scheduler
        .watch(&token, |report| {
            if let Err(e) = print_report(report, json) {
                print_error.get_or_insert(e);
            }
        })
        .await;

    match print_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
