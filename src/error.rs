//! Unified error handling for the towersync crate
//!
//! Target client failures never surface here: they are classified into an
//! [`UploadOutcome`](crate::upload::UploadOutcome) by the client itself. What
//! remains are the failures that abort a run or a command, most importantly
//! record store failures, which are fatal to the current upload run.
//!
//! # Architecture
//!
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum
//!
//! # Usage
//!
//! ```rust,ignore
//! use towersync::error::{Error, ErrorCategory};
//!
//! fn handle_error(err: Error) {
//!     if err.category() == ErrorCategory::Storage {
//!         eprintln!("Record store unavailable: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Record store and I/O errors
    Storage,
    /// Network-related errors (HTTP client construction, transport)
    Network,
    /// Wire format encoding and decoding errors
    Encoding,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get description for the category
    pub fn description(&self) -> &'static str {
        match self {
            Self::Storage => "storage error",
            Self::Network => "network error",
            Self::Encoding => "encoding error",
            Self::Config => "configuration error",
            Self::Other => "other error",
        }
    }
}

/// Unified error type for the towersync crate
#[derive(Error, Debug)]
pub enum Error {
    /// Record store errors
    #[error("Storage error: {0}")]
    Storage(#[source] rusqlite::Error),

    /// Stored data that cannot be mapped back into a record
    #[error("Corrupt record in {table} (id {id}): {reason}")]
    CorruptRecord {
        table: &'static str,
        id: i64,
        reason: String,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage(_) | Self::CorruptRecord { .. } | Self::Io(_) => ErrorCategory::Storage,
            Self::Http(_) => ErrorCategory::Network,
            Self::Json(_) | Self::Csv(_) => ErrorCategory::Encoding,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }

    /// Check if this error is recoverable by re-running later
    ///
    /// Storage errors are never retried within a run; a later run may succeed
    /// once the store is reachable again.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Storage(_) => true,
            Self::CorruptRecord { .. } => false,
            Self::Io(_) => true,
            Self::Json(_) | Self::Csv(_) => false,
            Self::Http(_) => true,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err)
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
