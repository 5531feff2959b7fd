#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Rate-limited batch geocoding of imported address records.
//!
//! The pipeline has four parts:
//!
//! 1. [`scheduler::Scheduler`] releases work items one at a time, spaced
//!    by a fixed minimum interval from the batch's submission instant.
//! 2. [`worker`] performs one provider lookup per released record.
//! 3. [`tracker::ProgressTracker`] counts completions (successes and
//!    failures alike) and publishes [`tracker::BatchProgress`] snapshots.
//! 4. [`coordinator::BatchCoordinator`] owns the record collection and
//!    the tracker on a single task; releases and completions reach it as
//!    messages, so no two writers ever touch the records.
//!
//! Every batch carries a generation number. Starting a new batch
//! supersedes the previous one: its queued releases are dropped and any
//! late completions from its in-flight lookups are discarded.

pub mod coordinator;
pub mod progress;
pub mod scheduler;
pub mod tracker;
pub mod worker;

#[cfg(test)]
mod testing;

use std::time::Duration;

use csv_mapper_geocoder::service_registry::GeocodingService;
use csv_mapper_import::ImportError;

pub use coordinator::{BatchCoordinator, BatchSnapshot};
pub use progress::{LogProgress, NullProgress, ProgressCallback, null_progress};
pub use tracker::{BatchProgress, ProgressTracker, estimated_time_remaining, format_eta};

/// Default spacing between two provider requests.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1300);

/// Errors from batch operations.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The scheduler was configured with a zero interval.
    #[error("Minimum request interval must be greater than zero")]
    InvalidInterval,

    /// Importing the address file failed; no batch was started.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// The scheduler's dispatcher task is no longer running.
    #[error("Scheduler is no longer accepting work")]
    SchedulerClosed,

    /// The coordinator task is no longer running.
    #[error("Batch coordinator has stopped")]
    CoordinatorStopped,
}

/// Settings for a [`BatchCoordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Minimum spacing between two releases.
    pub min_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

impl BatchConfig {
    /// Uses the service's configured rate limit as the release spacing.
    #[must_use]
    pub const fn from_service(service: &GeocodingService) -> Self {
        Self {
            min_interval: service.rate_limit(),
        }
    }

    /// Returns a copy with the given spacing.
    #[must_use]
    pub const fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }
}
