//! Normalized result of delivering records to one target

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of an upload attempt for a single target
///
/// Variants are declared in ascending severity, so the derived ordering is
/// the severity ordering used when results are merged. `Cancelled` is the
/// most severe and dominates every other outcome.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    #[default]
    NotStarted,
    Success,
    NoData,
    PartiallySucceeded,
    ConnectionError,
    ServerError,
    InvalidCredential,
    InvalidData,
    LimitExceeded,
    PermissionDenied,
    DeleteFailed,
    Failure,
    Cancelled,
}

/// How the scheduler should treat an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeClass {
    /// Nothing went wrong
    Ok,
    /// Worth retrying later without user action
    Transient,
    /// The registry rejected the content
    PermanentData,
    /// Credentials or permissions must be fixed by the user
    PermanentAuth,
    /// The run was stopped on request
    Control,
}

impl UploadOutcome {
    /// Every outcome, least severe first
    pub const ALL: [UploadOutcome; 13] = [
        Self::NotStarted,
        Self::Success,
        Self::NoData,
        Self::PartiallySucceeded,
        Self::ConnectionError,
        Self::ServerError,
        Self::InvalidCredential,
        Self::InvalidData,
        Self::LimitExceeded,
        Self::PermissionDenied,
        Self::DeleteFailed,
        Self::Failure,
        Self::Cancelled,
    ];

    /// Keep whichever of the two outcomes is more severe
    pub fn most_severe(self, other: Self) -> Self {
        self.max(other)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Classification the scheduler uses to decide whether a retry can help
    pub fn class(&self) -> OutcomeClass {
        match self {
            Self::NotStarted | Self::Success | Self::NoData => OutcomeClass::Ok,
            Self::PartiallySucceeded
            | Self::ConnectionError
            | Self::ServerError
            | Self::LimitExceeded
            | Self::DeleteFailed
            | Self::Failure => OutcomeClass::Transient,
            Self::InvalidData => OutcomeClass::PermanentData,
            Self::InvalidCredential | Self::PermissionDenied => OutcomeClass::PermanentAuth,
            Self::Cancelled => OutcomeClass::Control,
        }
    }

    /// Short status line suitable for a notification
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotStarted => "Upload not started",
            Self::Success => "Upload succeeded",
            Self::NoData => "No new records to upload",
            Self::PartiallySucceeded => "Upload partially succeeded",
            Self::ConnectionError => "Connection failed",
            Self::ServerError => "Server error",
            Self::InvalidCredential => "Invalid API key",
            Self::InvalidData => "Rejected as invalid data",
            Self::LimitExceeded => "Upload limit exceeded",
            Self::PermissionDenied => "Permission denied",
            Self::DeleteFailed => "Failed to clean up uploaded records",
            Self::Failure => "Upload failed",
            Self::Cancelled => "Upload cancelled",
        }
    }

    /// Longer explanation of what the user can do about it
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotStarted => "The upload has not been attempted yet.",
            Self::Success => "All pending records were accepted.",
            Self::NoData => "There were no pending records, nothing was sent.",
            Self::PartiallySucceeded => {
                "Some records were accepted. The rest will be sent on the next run."
            }
            Self::ConnectionError => {
                "The registry could not be reached. Check the network connection."
            }
            Self::ServerError => "The registry reported an internal error. Try again later.",
            Self::InvalidCredential => {
                "The registry rejected the API key. Check the key in the configuration."
            }
            Self::InvalidData => "The registry rejected the uploaded records as malformed.",
            Self::LimitExceeded => "The registry's rate limit was hit. Try again later.",
            Self::PermissionDenied => "The account is not allowed to upload to this registry.",
            Self::DeleteFailed => "Records were uploaded but could not be removed locally.",
            Self::Failure => "The upload failed for an unknown reason.",
            Self::Cancelled => "The upload was stopped before it finished.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Success => "success",
            Self::NoData => "no_data",
            Self::PartiallySucceeded => "partially_succeeded",
            Self::ConnectionError => "connection_error",
            Self::ServerError => "server_error",
            Self::InvalidCredential => "invalid_credential",
            Self::InvalidData => "invalid_data",
            Self::LimitExceeded => "limit_exceeded",
            Self::PermissionDenied => "permission_denied",
            Self::DeleteFailed => "delete_failed",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
