//! In-memory test doubles for the pipeline.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use csv_mapper_address_models::Coordinate;
use csv_mapper_geocoder::{Candidate, GeocodeError, Geocoder};

use crate::progress::ProgressCallback;

#[derive(Clone)]
enum Answer {
    Candidates(Vec<(f64, f64)>),
    Error,
}

/// Geocoder answering from a fixed table, optionally after a delay.
///
/// Unknown addresses fail with [`GeocodeError::Provider`].
#[derive(Default)]
pub struct ScriptedGeocoder {
    answers: BTreeMap<String, Answer>,
    latency: BTreeMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidates(mut self, address: &str, candidates: &[(f64, f64)]) -> Self {
        self.answers
            .insert(address.to_owned(), Answer::Candidates(candidates.to_vec()));
        self
    }

    pub fn with_error(mut self, address: &str) -> Self {
        self.answers.insert(address.to_owned(), Answer::Error);
        self
    }

    pub fn with_latency(mut self, address: &str, latency: Duration) -> Self {
        self.latency.insert(address.to_owned(), latency);
        self
    }

    /// Queries received so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Geocoder for ScriptedGeocoder {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn geocode(&self, query: &str) -> Result<Vec<Candidate>, GeocodeError> {
        self.calls.lock().unwrap().push(query.to_owned());

        if let Some(latency) = self.latency.get(query) {
            tokio::time::sleep(*latency).await;
        }

        match self.answers.get(query) {
            Some(Answer::Candidates(points)) => Ok(points
                .iter()
                .map(|&(lat, lon)| Candidate {
                    coordinate: Coordinate::new(lat, lon),
                    matched_address: None,
                })
                .collect()),
            Some(Answer::Error) | None => Err(GeocodeError::Provider {
                message: format!("scripted failure for '{query}'"),
            }),
        }
    }
}

/// Sink that remembers what it was told.
#[derive(Default)]
pub struct RecordingProgress {
    total: AtomicU64,
    position: AtomicU64,
    finished: AtomicU64,
}

impl RecordingProgress {
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> u64 {
        self.finished.load(Ordering::SeqCst)
    }
}

impl ProgressCallback for RecordingProgress {
    fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
        self.position.store(0, Ordering::SeqCst);
    }

    fn inc(&self, delta: u64) {
        self.position.fetch_add(delta, Ordering::SeqCst);
    }

    fn set_message(&self, _msg: String) {}

    fn finish(&self, _msg: String) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}
