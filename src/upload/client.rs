//! Target client abstraction and HTTP outcome classification

use async_trait::async_trait;
use std::time::Duration;

use super::outcome::UploadOutcome;
use crate::models::{RecordBatch, RecordKind, UploadTarget};

/// Default user agent sent to every registry
pub const USER_AGENT: &str = concat!("towersync/", env!("CARGO_PKG_VERSION"));

/// One upload destination: encodes a batch and performs the network call
///
/// `send` never returns an error. Every failure, including encoding
/// failures, is folded into an [`UploadOutcome`].
#[async_trait]
pub trait TargetClient: Send + Sync {
    /// Which target this client delivers to
    fn target(&self) -> UploadTarget;

    /// Whether the registry accepts records of this kind at all
    fn supports(&self, kind: RecordKind) -> bool;

    /// Deliver the batch and classify the result
    async fn send(&self, batch: &RecordBatch) -> UploadOutcome;
}

/// Map an HTTP status code to an outcome
pub fn classify_status(status: u16) -> UploadOutcome {
    match status {
        200..=299 => UploadOutcome::Success,
        400 | 413 | 422 => UploadOutcome::InvalidData,
        401 => UploadOutcome::InvalidCredential,
        403 => UploadOutcome::PermissionDenied,
        429 => UploadOutcome::LimitExceeded,
        500..=599 => UploadOutcome::ServerError,
        _ => UploadOutcome::Failure,
    }
}

/// Map a transport-level reqwest error to an outcome
pub fn classify_transport_error(err: &reqwest::Error) -> UploadOutcome {
    if let Some(status) = err.status() {
        return classify_status(status.as_u16());
    }

    if err.is_timeout() || err.is_connect() || err.is_request() {
        UploadOutcome::ConnectionError
    } else {
        UploadOutcome::Failure
    }
}

/// Shared HTTP client construction for the registry clients
pub(crate) fn build_http_client(timeout: Duration) -> crate::error::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .gzip(true)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(200), UploadOutcome::Success);
        assert_eq!(classify_status(204), UploadOutcome::Success);
        assert_eq!(classify_status(400), UploadOutcome::InvalidData);
        assert_eq!(classify_status(413), UploadOutcome::InvalidData);
        assert_eq!(classify_status(422), UploadOutcome::InvalidData);
        assert_eq!(classify_status(401), UploadOutcome::InvalidCredential);
        assert_eq!(classify_status(403), UploadOutcome::PermissionDenied);
        assert_eq!(classify_status(429), UploadOutcome::LimitExceeded);
        assert_eq!(classify_status(500), UploadOutcome::ServerError);
        assert_eq!(classify_status(503), UploadOutcome::ServerError);
        assert_eq!(classify_status(404), UploadOutcome::Failure);
        assert_eq!(classify_status(302), UploadOutcome::Failure);
    }

    #[test]
    fn test_user_agent() {
        assert!(USER_AGENT.starts_with("towersync/"));
    }
}
