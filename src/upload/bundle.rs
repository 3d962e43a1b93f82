//! Aggregation of per-target outcomes across kinds and batches

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::config::UploadConfig;
use super::outcome::{OutcomeClass, UploadOutcome};
use crate::models::UploadTarget;

/// Outcome per target, always populated for every target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBundle {
    results: BTreeMap<UploadTarget, UploadOutcome>,
}

impl Default for ResultBundle {
    fn default() -> Self {
        Self::filled(UploadOutcome::NotStarted)
    }
}

impl ResultBundle {
    /// Bundle with every target at `NotStarted`
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle with every target set to the same outcome
    pub fn filled(outcome: UploadOutcome) -> Self {
        Self {
            results: UploadTarget::ALL.iter().map(|t| (*t, outcome)).collect(),
        }
    }

    pub fn get(&self, target: UploadTarget) -> UploadOutcome {
        self.results.get(&target).copied().unwrap_or_default()
    }

    /// Overwrite the outcome of one target
    pub fn set(&mut self, target: UploadTarget, outcome: UploadOutcome) {
        self.results.insert(target, outcome);
    }

    /// Record an outcome, keeping the existing one if it is more severe
    pub fn record(&mut self, target: UploadTarget, outcome: UploadOutcome) {
        let merged = self.get(target).most_severe(outcome);
        self.results.insert(target, merged);
    }

    /// Per target, the more severe of the two outcomes
    pub fn merge(&self, other: &ResultBundle) -> ResultBundle {
        let mut merged = self.clone();
        merged.merge_from(other);
        merged
    }

    /// In-place form of [`merge`](Self::merge)
    pub fn merge_from(&mut self, other: &ResultBundle) {
        for target in UploadTarget::ALL {
            self.record(target, other.get(target));
        }
    }

    /// True when every target succeeded or is disabled
    pub fn all_succeeded(&self, config: &UploadConfig) -> bool {
        UploadTarget::ALL
            .iter()
            .all(|t| !config.is_enabled(*t) || self.get(*t).is_success())
    }

    /// First enabled target whose outcome will not change until the user acts
    ///
    /// Rejected credentials, denied permissions and rejected data all repeat
    /// on every retry with the same configuration and records.
    pub fn permanent_failure(
        &self,
        config: &UploadConfig,
    ) -> Option<(UploadTarget, UploadOutcome)> {
        self.iter().find(|(target, outcome)| {
            config.is_enabled(*target)
                && matches!(
                    outcome.class(),
                    OutcomeClass::PermanentAuth | OutcomeClass::PermanentData
                )
        })
    }

    pub fn mark_all_cancelled(&mut self) {
        self.mark_all(UploadOutcome::Cancelled);
    }

    pub fn mark_all_failed(&mut self) {
        self.mark_all(UploadOutcome::Failure);
    }

    fn mark_all(&mut self, outcome: UploadOutcome) {
        for target in UploadTarget::ALL {
            self.results.insert(target, outcome);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (UploadTarget, UploadOutcome)> + '_ {
        self.results.iter().map(|(t, o)| (*t, *o))
    }

    /// The most severe outcome across all targets
    pub fn worst(&self) -> UploadOutcome {
        self.results
            .values()
            .copied()
            .max()
            .unwrap_or_default()
    }
}
