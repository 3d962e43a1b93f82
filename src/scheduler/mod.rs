//! Upload scheduling
//!
//! The coordinator performs exactly one bounded run per call. This module is
//! the collaborator that decides when to call it again:
//!
//! - `Succeeded` or `Failed`: wait for the regular interval
//! - `Retrying`: wait with exponential backoff, up to `max_retries` times,
//!   unless a target rejected the credentials or the data
//! - `Cancelled`: stop
//!
//! Record store failures abort a run with `Err`; the scheduler turns them
//! into a `Failed` report with every target at `Failure`.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::upload::{Disposition, RunReport, UploadConfig, UploadCoordinator};
use crate::utils::retry::RetryConfig;

/// Periodic driver of upload runs
pub struct UploadScheduler {
    coordinator: Arc<UploadCoordinator>,
    config: UploadConfig,
    retry: RetryConfig,
    interval: Duration,
}

impl UploadScheduler {
    /// Create a scheduler with the default retry policy and a one hour interval
    pub fn new(coordinator: Arc<UploadCoordinator>, config: UploadConfig) -> Self {
        Self {
            coordinator,
            config,
            retry: RetryConfig::default(),
            interval: Duration::from_secs(3600),
        }
    }

    /// Set the retry policy used after `Retrying` runs
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the pause between regular runs
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Perform a single run, converting run errors into a failed report
    pub async fn run_once(&self, token: &CancellationToken) -> RunReport {
        self.attempt(token).await.0
    }

    /// Run, retrying with backoff while the run asks for it
    ///
    /// Returns the last report. A `Retrying` report is returned once the
    /// retry budget is spent, or right away when a target rejected the
    /// credentials or the data.
    pub async fn run_with_retries(&self, token: &CancellationToken) -> RunReport {
        self.cycle(token).await.0
    }

    /// Keep uploading until the token is cancelled
    ///
    /// `on_report` sees the final report of every scheduled run. A run error
    /// that a later run cannot recover from, such as a configuration error,
    /// also stops the loop.
    pub async fn watch<F>(&self, token: &CancellationToken, mut on_report: F)
    where
        F: FnMut(&RunReport),
    {
        loop {
            let (report, error) = self.cycle(token).await;
            on_report(&report);

            if report.disposition == Disposition::Cancelled || token.is_cancelled() {
                break;
            }
            if let Some(e) = error.filter(|e| !e.is_recoverable()) {
                tracing::error!(error = %e, "Stopping scheduled uploads");
                break;
            }

            tracing::debug!(
                interval_secs = self.interval.as_secs(),
                "Waiting for next scheduled upload"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = token.cancelled() => break,
            }
        }

        tracing::info!("Upload scheduler stopped");
    }

    async fn attempt(&self, token: &CancellationToken) -> (RunReport, Option<Error>) {
        let started_at = Utc::now();
        match self.coordinator.run(&self.config, token).await {
            Ok(report) => (report, None),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    category = e.category().description(),
                    recoverable = e.is_recoverable(),
                    "Upload run aborted"
                );
                (RunReport::aborted(started_at), Some(e))
            }
        }
    }

    async fn cycle(&self, token: &CancellationToken) -> (RunReport, Option<Error>) {
        let mut attempt = 0;

        loop {
            let (report, error) = self.attempt(token).await;
            if report.disposition != Disposition::Retrying || !self.retry.allows(attempt) {
                return (report, error);
            }

            if let Some((target, outcome)) = report.results.permanent_failure(&self.config) {
                tracing::warn!(
                    registry = target.as_str(),
                    outcome = %outcome,
                    "Not retrying until the configuration or records change"
                );
                return (report, error);
            }

            attempt += 1;
            let delay = self.retry.jittered_delay(attempt);
            tracing::info!(
                attempt,
                max_retries = self.retry.max_retries,
                delay_secs = delay.as_secs_f64(),
                "Upload incomplete, retrying after delay"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = token.cancelled() => {
                    tracing::info!("Retry wait cancelled");
                    return (report, error);
                }
            }
        }
    }
}
