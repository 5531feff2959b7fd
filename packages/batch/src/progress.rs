//! Rendering sinks for batch progress.
//!
//! [`ProgressCallback`] decouples progress reporting from any specific
//! backend (an `indicatif` bar in the CLI, plain log lines, or silence).
//! The [`crate::tracker::ProgressTracker`] forwards every state change to
//! one of these; the authoritative numbers live in the tracker.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Receives progress updates for display.
///
/// Implementations must be `Send + Sync`: updates arrive from the
/// coordinator task while the sink is shared with the caller.
pub trait ProgressCallback: Send + Sync {
    /// A new batch of `total` items started; position is back at zero.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}

/// Writes a log line each time another tenth of the batch completes.
///
/// Useful for headless runs where no terminal bar is drawn.
#[derive(Default)]
pub struct LogProgress {
    total: AtomicU64,
    position: AtomicU64,
}

impl LogProgress {
    /// Creates a sink with no batch started.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressCallback for LogProgress {
    fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
        self.position.store(0, Ordering::SeqCst);
    }

    fn inc(&self, delta: u64) {
        let total = self.total.load(Ordering::SeqCst);
        let before = self.position.fetch_add(delta, Ordering::SeqCst);
        let after = before + delta;
        if total == 0 {
            return;
        }
        if before * 10 / total != after * 10 / total {
            log::info!("Geocoding progress: {after}/{total}");
        }
    }

    fn set_message(&self, msg: String) {
        log::debug!("{msg}");
    }

    fn finish(&self, msg: String) {
        log::info!("{msg}");
    }
}
