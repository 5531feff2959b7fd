//! One geocoding attempt per released record.
//!
//! A worker never panics and never retries: every outcome, including a
//! provider error, is reported back to the coordinator as a completion.

use csv_mapper_address_models::Coordinate;
use csv_mapper_geocoder::{GeocodeError, Geocoder};
use tokio::sync::mpsc;

/// A record handed to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Batch the record belongs to.
    pub generation: u64,
    /// Position of the record in the batch.
    pub index: usize,
    /// Free-form query sent to the provider.
    pub address: String,
}

/// Result of one attempt.
#[derive(Debug)]
pub struct Completion {
    /// Batch the record belongs to.
    pub generation: u64,
    /// Position of the record in the batch.
    pub index: usize,
    /// Resolved coordinate, or why there is none.
    pub outcome: Result<Coordinate, GeocodeError>,
}

/// Messages sent from workers to the coordinator.
#[derive(Debug)]
pub enum WorkerEvent {
    /// The scheduler released the job; the provider call is starting.
    Released {
        /// Batch the record belongs to.
        generation: u64,
        /// Position of the record in the batch.
        index: usize,
    },
    /// The provider call finished.
    Completed(Completion),
}

/// Looks up `address` and keeps the first candidate.
///
/// Zero candidates is reported as [`GeocodeError::NoCandidates`].
///
/// # Errors
///
/// Returns the provider's [`GeocodeError`], or
/// [`GeocodeError::NoCandidates`] if nothing matched.
pub async fn resolve(geocoder: &dyn Geocoder, address: &str) -> Result<Coordinate, GeocodeError> {
    let result = geocoder.geocode(address).await.and_then(|candidates| {
        candidates
            .into_iter()
            .next()
            .map(|c| c.coordinate)
            .ok_or(GeocodeError::NoCandidates)
    });

    match &result {
        Ok(c) => log::debug!(
            "{}: '{address}' -> ({}, {})",
            geocoder.name(),
            c.latitude,
            c.longitude
        ),
        Err(GeocodeError::NoCandidates) => {
            log::warn!("{}: no match for '{address}'", geocoder.name());
        }
        Err(e) => log::warn!("{} error for '{address}': {e}", geocoder.name()),
    }

    result
}

/// Runs one job and reports both its release and its completion.
///
/// Send failures mean the coordinator has shut down; they are ignored.
pub async fn run(geocoder: &dyn Geocoder, job: Job, events: &mpsc::UnboundedSender<WorkerEvent>) {
    let Job {
        generation,
        index,
        address,
    } = job;

    events
        .send(WorkerEvent::Released { generation, index })
        .ok();

    let outcome = resolve(geocoder, &address).await;

    events
        .send(WorkerEvent::Completed(Completion {
            generation,
            index,
            outcome,
        }))
        .ok();
}
