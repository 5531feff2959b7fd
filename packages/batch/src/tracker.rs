//! Batch completion counting and derived progress figures.
//!
//! [`BatchProgress`] is the authoritative state; the fraction and the
//! time-remaining estimate are computed from it on demand and never stored.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::progress::ProgressCallback;

/// Completion state of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchProgress {
    /// Batch this state belongs to (0 before the first batch).
    pub generation: u64,
    /// Number of records submitted.
    pub total: u64,
    /// Number of records completed, successful or not.
    pub completed: u64,
}

impl BatchProgress {
    /// Progress at the start of a batch.
    #[must_use]
    pub const fn new(generation: u64, total: u64) -> Self {
        Self {
            generation,
            total,
            completed: 0,
        }
    }

    /// `completed / total` in `[0.0, 1.0]`; `0.0` for an empty batch.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }

    /// Records not yet completed.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.completed)
    }

    /// Whether every record has completed.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.completed >= self.total
    }

    /// Pessimistic time-to-completion; see [`estimated_time_remaining`].
    #[must_use]
    pub fn estimated_time_remaining(&self, min_interval: Duration) -> Duration {
        estimated_time_remaining(self.remaining(), min_interval)
    }

    /// [`Self::estimated_time_remaining`] in whole seconds.
    #[must_use]
    pub fn estimated_seconds_remaining(&self, min_interval: Duration) -> u64 {
        self.estimated_time_remaining(min_interval).as_secs()
    }
}

/// Assumes every outstanding record still needs a full release slot,
/// regardless of how fast the provider has been answering.
#[must_use]
pub fn estimated_time_remaining(remaining: u64, min_interval: Duration) -> Duration {
    min_interval.saturating_mul(u32::try_from(remaining).unwrap_or(u32::MAX))
}

/// Formats a countdown as `m:ss`, or `h:mm:ss` from one hour up.
#[must_use]
pub fn format_eta(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Publishes [`BatchProgress`] to observers and a rendering sink.
///
/// Each update is a read-modify-write under the watch channel's lock, so
/// concurrent [`Self::record_completion`] calls never lose an increment.
pub struct ProgressTracker {
    state: watch::Sender<BatchProgress>,
    sink: Arc<dyn ProgressCallback>,
}

impl ProgressTracker {
    /// Creates a tracker in the "no batch yet" state.
    #[must_use]
    pub fn new(sink: Arc<dyn ProgressCallback>) -> Self {
        let (state, _) = watch::channel(BatchProgress::default());
        Self { state, sink }
    }

    /// Starts counting a new batch of `total` records.
    pub fn reset(&self, generation: u64, total: u64) {
        self.state.send_replace(BatchProgress::new(generation, total));
        self.sink.set_total(total);
        self.sink.set_message(format!("Geocoding {total} addresses"));
        if total == 0 {
            self.sink.finish("No addresses to geocode".to_string());
        }
    }

    /// Counts one completed record and returns the new state.
    ///
    /// Saturates at the batch total; extra calls leave the state unchanged.
    pub fn record_completion(&self) -> BatchProgress {
        let mut advanced = false;
        self.state.send_if_modified(|progress| {
            if progress.completed < progress.total {
                progress.completed += 1;
                advanced = true;
            }
            advanced
        });

        let progress = self.snapshot();
        if advanced {
            self.sink.inc(1);
            if progress.is_done() {
                self.sink
                    .finish(format!("Geocoded {} addresses", progress.total));
            }
        }
        progress
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> BatchProgress {
        *self.state.borrow()
    }

    /// Receiver that is notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BatchProgress> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingProgress;

    #[test]
    fn empty_batch_fraction_is_zero_not_nan() {
        let p = BatchProgress::new(1, 0);
        assert!(p.fraction().abs() < f64::EPSILON);
        assert!(p.is_done());
    }

    #[test]
    fn fraction_tracks_completions() {
        let mut p = BatchProgress::new(1, 3);
        assert!(p.fraction().abs() < f64::EPSILON);
        p.completed = 1;
        assert!((p.fraction() - 1.0 / 3.0).abs() < 1e-9);
        p.completed = 3;
        assert!((p.fraction() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn eta_is_remaining_times_interval() {
        let mut p = BatchProgress::new(1, 10);
        p.completed = 4;
        let interval = Duration::from_millis(1300);
        assert_eq!(p.estimated_time_remaining(interval), Duration::from_millis(7800));
        assert_eq!(p.estimated_seconds_remaining(interval), 7);
    }

    #[test]
    fn formats_countdown() {
        assert_eq!(format_eta(Duration::from_secs(0)), "0:00");
        assert_eq!(format_eta(Duration::from_secs(65)), "1:05");
        assert_eq!(format_eta(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn completions_saturate_at_total() {
        let tracker = ProgressTracker::new(crate::null_progress());
        tracker.reset(1, 2);
        tracker.record_completion();
        tracker.record_completion();
        let p = tracker.record_completion();
        assert_eq!(p.completed, 2);
        assert!(p.is_done());
    }

    #[test]
    fn reset_starts_a_new_generation() {
        let tracker = ProgressTracker::new(crate::null_progress());
        tracker.reset(1, 2);
        tracker.record_completion();
        tracker.reset(2, 5);
        assert_eq!(tracker.snapshot(), BatchProgress::new(2, 5));
    }

    #[test]
    fn forwards_to_sink() {
        let sink = Arc::new(RecordingProgress::default());
        let tracker = ProgressTracker::new(sink.clone());
        tracker.reset(1, 2);
        tracker.record_completion();
        tracker.record_completion();
        tracker.record_completion();

        assert_eq!(sink.total(), 2);
        assert_eq!(sink.position(), 2);
        assert_eq!(sink.finished(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_completions_are_not_lost() {
        let tracker = Arc::new(ProgressTracker::new(crate::null_progress()));
        tracker.reset(1, 200);

        let handles: Vec<_> = (0..250)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                tokio::spawn(async move { tracker.record_completion() })
            })
            .collect();

        for handle in handles {
            let p = handle.await.unwrap();
            assert!(p.completed <= p.total);
        }

        assert_eq!(tracker.snapshot().completed, 200);
    }
}
