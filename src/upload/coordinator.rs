//! Upload coordinator
//!
//! Drives one upload run: plans batch steps from the pending count, fetches
//! each kind's next window of pending records, fans the batch out to every
//! target concurrently, flips delivery flags for the targets that accepted
//! it and folds the outcomes into the run's [`ResultBundle`].
//!
//! # Run states
//!
//! ```text
//! Idle ──► Running ──┬──► Succeeded
//!                    ├──► Retrying   (a target failed, retry enabled)
//!                    ├──► Failed     (a target failed, retry disabled)
//!                    └──► Cancelled  (token fired)
//! ```
//!
//! Flags are only ever set after a target reports `Success` for the exact
//! records it was sent. A cancelled or failed step leaves its records
//! pending, so the next run picks them up again.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::bundle::ResultBundle;
use super::client::TargetClient;
use super::config::UploadConfig;
use super::outcome::UploadOutcome;
use super::progress::{NoProgress, ProgressReporter};
use crate::error::{Error, Result};
use crate::models::{RecordBatch, RecordId, RecordKind, UploadTarget};
use crate::storage::{RecordStore, TargetSelector};

/// Terminal state of an upload run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Succeeded,
    Retrying,
    Failed,
    Cancelled,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Retrying => "retrying",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Running,
    Done(Disposition),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running => f.write_str("running"),
            Self::Done(d) => d.fmt(f),
        }
    }
}

/// Summary of one upload run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub disposition: Disposition,
    pub results: ResultBundle,
    pub batches_completed: usize,
    pub batches_planned: usize,
    /// Records newly flagged as delivered, per target
    pub records_delivered: BTreeMap<UploadTarget, usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    fn start(run_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            disposition: Disposition::Succeeded,
            results: ResultBundle::new(),
            batches_completed: 0,
            batches_planned: 0,
            records_delivered: UploadTarget::ALL.iter().map(|t| (*t, 0)).collect(),
            started_at: now,
            finished_at: now,
        }
    }

    /// Report for a run that aborted before producing outcomes
    ///
    /// Every target is marked `Failure`.
    pub fn aborted(started_at: DateTime<Utc>) -> Self {
        let mut report = Self::start(Uuid::new_v4());
        report.started_at = started_at;
        report.disposition = Disposition::Failed;
        report.results.mark_all_failed();
        report
    }

    /// Records newly delivered to the target during this run
    pub fn delivered_to(&self, target: UploadTarget) -> usize {
        self.records_delivered.get(&target).copied().unwrap_or(0)
    }

    /// Per-target message and description for display
    pub fn target_messages(&self) -> Vec<(UploadTarget, &'static str, &'static str)> {
        self.results
            .iter()
            .map(|(target, outcome)| (target, outcome.message(), outcome.description()))
            .collect()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// What one target did with one kind-batch
struct Delivery {
    target: UploadTarget,
    outcome: UploadOutcome,
    ids: Vec<RecordId>,
}

/// Orchestrates upload runs over a record store and a set of target clients
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use towersync::upload::{UploadConfig, UploadCoordinator};
///
/// let coordinator = UploadCoordinator::new(store)
///     .with_client(Arc::new(ocid_client))
///     .with_client(Arc::new(beacondb_client));
///
/// let report = coordinator.run(&UploadConfig::default(), &CancellationToken::new()).await?;
/// println!("{}", report.disposition);
/// ```
pub struct UploadCoordinator {
    store: Arc<dyn RecordStore>,
    clients: BTreeMap<UploadTarget, Arc<dyn TargetClient>>,
    progress: Arc<dyn ProgressReporter>,
}

impl UploadCoordinator {
    /// Create a coordinator with no clients and no progress reporting
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            clients: BTreeMap::new(),
            progress: Arc::new(NoProgress),
        }
    }

    /// Register the client for its target, replacing any previous one
    pub fn with_client(mut self, client: Arc<dyn TargetClient>) -> Self {
        self.clients.insert(client.target(), client);
        self
    }

    /// Set the progress reporter
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// The underlying record store
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Execute one upload run
    ///
    /// Returns `Err` only for configuration and record store failures.
    /// Target failures are reported through the returned [`RunReport`].
    pub async fn run(&self, config: &UploadConfig, token: &CancellationToken) -> Result<RunReport> {
        config.validate()?;
        for target in config.enabled_targets() {
            if !self.clients.contains_key(&target) {
                return Err(Error::config(format!(
                    "{target} is enabled but no client is configured"
                )));
            }
        }

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("upload_run", %run_id);
        self.execute(run_id, config, token).instrument(span).await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        config: &UploadConfig,
        token: &CancellationToken,
    ) -> Result<RunReport> {
        let mut report = RunReport::start(run_id);
        let mut state = RunState::Idle;
        transition(&mut state, RunState::Running);

        let total = self.store.count_pending(TargetSelector::Any)?;
        if total == 0 {
            tracing::info!("No pending records");
            report.results = ResultBundle::filled(UploadOutcome::NoData);
            self.progress.report(1.0, "No records to upload");
            return Ok(finish(report, &mut state, Disposition::Succeeded));
        }

        let steps = total.div_ceil(config.batch_size);
        report.batches_planned = steps;
        tracing::info!(
            records = total,
            batches = steps,
            batch_size = config.batch_size,
            "Starting upload"
        );

        for step in 0..steps {
            if token.is_cancelled() {
                return Ok(self.cancel(report, &mut state));
            }

            let mut step_results = ResultBundle::new();
            let mut fetched_any = false;

            for kind in RecordKind::ALL {
                let records =
                    self.store
                        .fetch_pending(kind, TargetSelector::Any, config.batch_size)?;
                if records.is_empty() {
                    continue;
                }
                fetched_any = true;
                let batch = RecordBatch::new(kind, records);

                let deliveries = tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    deliveries = self.deliver(&batch, config) => Some(deliveries),
                };
                let Some(deliveries) = deliveries else {
                    tracing::warn!(kind = kind.as_str(), "Upload cancelled while sending");
                    return Ok(self.cancel(report, &mut state));
                };

                for delivery in deliveries {
                    if delivery.outcome.is_success() && !delivery.ids.is_empty() {
                        self.store
                            .mark_delivered(delivery.target, kind, &delivery.ids)?;
                        *report.records_delivered.entry(delivery.target).or_default() +=
                            delivery.ids.len();
                    }
                    step_results.record(delivery.target, delivery.outcome);
                }
            }

            if !fetched_any {
                tracing::debug!(step, "Backlog drained before planned batches ran out");
                break;
            }

            report.results.merge_from(&step_results);
            report.batches_completed = step + 1;
            self.progress.report(
                report.batches_completed as f64 / steps as f64,
                &format!("Uploaded batch {} of {}", step + 1, steps),
            );

            if !report.results.all_succeeded(config) {
                let disposition = if config.retry_enabled {
                    Disposition::Retrying
                } else {
                    Disposition::Failed
                };
                for (target, outcome) in report.results.iter() {
                    if !outcome.is_success() && config.is_enabled(target) {
                        tracing::warn!(registry = target.as_str(), outcome = %outcome, "Target did not accept batch");
                    }
                }
                return Ok(finish(report, &mut state, disposition));
            }
        }

        for target in UploadTarget::ALL {
            if report.results.get(target) == UploadOutcome::NotStarted {
                report.results.set(target, UploadOutcome::NoData);
            }
        }
        if report.batches_completed < steps {
            self.progress.report(1.0, "Upload complete");
        }

        Ok(finish(report, &mut state, Disposition::Succeeded))
    }

    /// Send one kind-batch to every target and wait for all of them
    async fn deliver(&self, batch: &RecordBatch, config: &UploadConfig) -> Vec<Delivery> {
        let mut settled = Vec::new();
        let mut sends = Vec::new();

        for target in UploadTarget::ALL {
            let subset = batch.pending_for(target);
            let client = self.clients.get(&target);

            let client = match client {
                Some(client) if config.is_enabled(target) && client.supports(batch.kind) => {
                    Arc::clone(client)
                }
                _ => {
                    // Never contacted, so nothing to wait for before flagging.
                    settled.push(Delivery {
                        target,
                        outcome: UploadOutcome::Success,
                        ids: subset.ids(),
                    });
                    continue;
                }
            };

            if subset.is_empty() {
                settled.push(Delivery {
                    target,
                    outcome: UploadOutcome::Success,
                    ids: Vec::new(),
                });
                continue;
            }

            let timeout = config.send_timeout;
            sends.push(async move {
                let outcome = match tokio::time::timeout(timeout, client.send(&subset)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::warn!(
                            registry = target.as_str(),
                            timeout_secs = timeout.as_secs_f64(),
                            "Send timed out"
                        );
                        UploadOutcome::ConnectionError
                    }
                };
                tracing::debug!(
                    registry = target.as_str(),
                    kind = subset.kind.as_str(),
                    records = subset.len(),
                    outcome = %outcome,
                    "Batch sent"
                );
                Delivery {
                    target,
                    outcome,
                    ids: subset.ids(),
                }
            });
        }

        settled.extend(join_all(sends).await);
        settled
    }

    fn cancel(&self, mut report: RunReport, state: &mut RunState) -> RunReport {
        report.results.mark_all_cancelled();
        tracing::info!(
            batches_completed = report.batches_completed,
            batches_planned = report.batches_planned,
            "Upload cancelled"
        );
        finish(report, state, Disposition::Cancelled)
    }
}

fn transition(state: &mut RunState, next: RunState) {
    tracing::debug!(from = %state, to = %next, "Upload state change");
    *state = next;
}

fn finish(mut report: RunReport, state: &mut RunState, disposition: Disposition) -> RunReport {
    transition(state, RunState::Done(disposition));
    report.disposition = disposition;
    report.finished_at = Utc::now();

    tracing::info!(
        disposition = %disposition,
        batches_completed = report.batches_completed,
        opencellid = %report.results.get(UploadTarget::OpenCelliD),
        beacondb = %report.results.get(UploadTarget::BeaconDb),
        "Upload run finished"
    );
    report
}
