//! Progress reporting from a running upload

use tokio::sync::mpsc;

/// One progress notification
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Completed share of the run in `0.0..=1.0`
    pub fraction: f64,
    pub message: String,
}

/// Receives progress from the coordinator; never blocks the run
pub trait ProgressReporter: Send + Sync {
    fn report(&self, fraction: f64, message: &str);
}

/// Writes progress to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, fraction: f64, message: &str) {
        tracing::info!(progress = format!("{:.0}%", fraction * 100.0), "{message}");
    }
}

/// Discards progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _fraction: f64, _message: &str) {}
}

/// Forwards progress to a closure
pub struct FnProgress<F>(pub F);

impl<F> ProgressReporter for FnProgress<F>
where
    F: Fn(f64, &str) + Send + Sync,
{
    fn report(&self, fraction: f64, message: &str) {
        (self.0)(fraction, message)
    }
}

/// Forwards progress over an unbounded channel
///
/// A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ChannelProgress {
    /// Create a reporter and the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressReporter for ChannelProgress {
    fn report(&self, fraction: f64, message: &str) {
        let _ = self.tx.send(ProgressUpdate {
            fraction,
            message: message.to_string(),
        });
    }
}
