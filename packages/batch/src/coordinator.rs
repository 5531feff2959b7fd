//! Batch coordinator: owns the records and drives a batch to completion.
//!
//! All mutable state (the record collection, per-record states, progress,
//! and the active generation) lives on one owner task. Callers talk to it
//! through a command channel; workers report releases and completions
//! through an event channel. Observers read immutable snapshots published
//! over [`watch`] channels, so they never see a half-applied update.
//!
//! Starting a batch while another is running supersedes the old one:
//! its unreleased items are cancelled in the scheduler, and completions
//! still in flight are discarded when they arrive because their generation
//! no longer matches.

use std::path::Path;
use std::sync::Arc;

use csv_mapper_address_models::{AddressRecord, Coordinate, RecordState};
use csv_mapper_geocoder::Geocoder;
use csv_mapper_import::ImportConfig;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::progress::ProgressCallback;
use crate::scheduler::Scheduler;
use crate::tracker::{BatchProgress, ProgressTracker};
use crate::worker::{self, Completion, Job, WorkerEvent};
use crate::{BatchConfig, BatchError};

/// Consistent view of the current batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSnapshot {
    /// Batch the records belong to (0 before the first batch).
    pub generation: u64,
    /// Records in import order.
    pub records: Vec<AddressRecord>,
    /// Lifecycle state of each record, parallel to `records`.
    pub states: Vec<RecordState>,
}

impl BatchSnapshot {
    /// Records that have a coordinate, with that coordinate.
    pub fn resolved(&self) -> impl Iterator<Item = (&AddressRecord, Coordinate)> {
        self.records
            .iter()
            .filter_map(|r| r.coordinate().map(|c| (r, c)))
    }

    /// Coordinates of all resolved records, in import order.
    #[must_use]
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.resolved().map(|(_, c)| c).collect()
    }

    /// Number of records in the given state.
    #[must_use]
    pub fn count_in(&self, state: RecordState) -> usize {
        self.states.iter().filter(|s| **s == state).count()
    }
}

enum Command {
    Start {
        records: Vec<AddressRecord>,
        reply: oneshot::Sender<u64>,
    },
}

/// Handle to a running coordinator task.
pub struct BatchCoordinator {
    config: BatchConfig,
    commands: mpsc::UnboundedSender<Command>,
    progress: watch::Receiver<BatchProgress>,
    snapshot: watch::Receiver<Arc<BatchSnapshot>>,
    task: JoinHandle<()>,
}

impl BatchCoordinator {
    /// Starts the coordinator and its scheduler.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::InvalidInterval`] if the configured interval is
    /// zero.
    pub fn spawn(
        geocoder: Arc<dyn Geocoder>,
        config: BatchConfig,
        sink: Arc<dyn ProgressCallback>,
    ) -> Result<Self, BatchError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let scheduler = Scheduler::spawn(config.min_interval, move |job: Job| {
            let geocoder = Arc::clone(&geocoder);
            let events = events_tx.clone();
            async move { worker::run(geocoder.as_ref(), job, &events).await }
        })?;

        let tracker = ProgressTracker::new(sink);
        let progress = tracker.subscribe();
        let (snapshot_tx, snapshot) = watch::channel(Arc::new(BatchSnapshot::default()));
        let (commands, commands_rx) = mpsc::unbounded_channel();

        let owner = Owner {
            scheduler,
            tracker,
            snapshot: snapshot_tx,
            generation: 0,
            records: Vec::new(),
            states: Vec::new(),
        };
        let task = tokio::spawn(owner.run(commands_rx, events_rx));

        Ok(Self {
            config,
            commands,
            progress,
            snapshot,
            task,
        })
    }

    /// Replaces the record collection and starts geocoding it.
    ///
    /// Returns the new batch's generation. Any batch still running is
    /// superseded.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::CoordinatorStopped`] if the owner task has
    /// exited.
    pub async fn import_and_geocode(&self, records: Vec<AddressRecord>) -> Result<u64, BatchError> {
        let (reply, generation) = oneshot::channel();
        self.commands
            .send(Command::Start { records, reply })
            .map_err(|_| BatchError::CoordinatorStopped)?;
        generation.await.map_err(|_| BatchError::CoordinatorStopped)
    }

    /// Imports an address file and, only if that succeeds, starts a batch.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Import`] without touching the current records
    /// or progress if the file cannot be imported.
    pub async fn import_path_and_geocode(
        &self,
        path: &Path,
        config: &ImportConfig,
    ) -> Result<u64, BatchError> {
        let records = csv_mapper_import::import_path(path, config)?;
        self.import_and_geocode(records).await
    }

    /// Settings this coordinator was started with.
    #[must_use]
    pub const fn config(&self) -> BatchConfig {
        self.config
    }

    /// Current progress.
    #[must_use]
    pub fn progress(&self) -> BatchProgress {
        *self.progress.borrow()
    }

    /// Receiver notified on every progress change.
    #[must_use]
    pub fn subscribe_progress(&self) -> watch::Receiver<BatchProgress> {
        self.progress.clone()
    }

    /// Consistent snapshot of the current records and their states.
    #[must_use]
    pub fn snapshot(&self) -> Arc<BatchSnapshot> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// Receiver notified whenever a record changes state.
    #[must_use]
    pub fn subscribe_snapshot(&self) -> watch::Receiver<Arc<BatchSnapshot>> {
        self.snapshot.clone()
    }

    /// Records of the current batch, in import order.
    #[must_use]
    pub fn records(&self) -> Vec<AddressRecord> {
        self.snapshot().records.clone()
    }

    /// Lifecycle state of each record of the current batch.
    #[must_use]
    pub fn record_states(&self) -> Vec<RecordState> {
        self.snapshot().states.clone()
    }

    /// Coordinates resolved so far, in import order.
    #[must_use]
    pub fn resolved_coordinates(&self) -> Vec<Coordinate> {
        self.snapshot().coordinates()
    }

    /// Waits until the current batch has completed and returns its final
    /// progress. If a newer batch is started meanwhile, waits for that one.
    ///
    /// Once this returns, [`Self::snapshot`] already holds every outcome
    /// the returned progress counts.
    pub async fn wait_until_done(&self) -> BatchProgress {
        let mut rx = self.progress.clone();
        if let Ok(progress) = rx.wait_for(BatchProgress::is_done).await {
            return *progress;
        }
        *rx.borrow()
    }

    /// Stops the coordinator. Unreleased items are dropped; in-flight
    /// provider calls finish but their results are discarded.
    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(e) = self.task.await {
            log::error!("Batch coordinator task failed: {e}");
        }
    }
}

/// State owned exclusively by the coordinator task.
struct Owner {
    scheduler: Scheduler<Job>,
    tracker: ProgressTracker,
    snapshot: watch::Sender<Arc<BatchSnapshot>>,
    generation: u64,
    records: Vec<AddressRecord>,
    states: Vec<RecordState>,
}

impl Owner {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<WorkerEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Start { records, reply }) => {
                        let generation = self.start(records);
                        reply.send(generation).ok();
                    }
                    None => break,
                },
                Some(event) = events.recv() => self.handle(event),
            }
        }

        log::debug!("Batch coordinator stopped at generation {}", self.generation);
    }

    /// Replaces the batch. Records are `Pending` only inside this call:
    /// the first snapshot of a batch already shows them `Scheduled` (or
    /// `Unresolved` if the scheduler refused them).
    fn start(&mut self, records: Vec<AddressRecord>) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        self.scheduler.supersede(generation);

        let total = records.len();
        self.records = records;
        self.states = vec![RecordState::Pending; total];

        log::info!(
            "Starting batch {generation}: {total} addresses, one request every {:?}",
            self.scheduler.min_interval()
        );

        let clock = self.scheduler.begin_batch(generation);
        let mut refused = 0;
        for (index, record) in self.records.iter().enumerate() {
            let job = Job {
                generation,
                index,
                address: record.full_address(),
            };
            self.states[index] = match self.scheduler.schedule(&clock, job, index) {
                Ok(_) => RecordState::Scheduled,
                Err(e) => {
                    log::error!("Could not schedule record {index}: {e}");
                    refused += 1;
                    RecordState::Unresolved
                }
            };
        }

        // Snapshot before progress: a finished count must never be visible
        // ahead of the records it describes.
        self.publish();
        self.tracker.reset(generation, total as u64);
        for _ in 0..refused {
            self.tracker.record_completion();
        }

        generation
    }

    fn handle(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Released { generation, index } => {
                if generation != self.generation {
                    return;
                }
                if let Some(state) = self.states.get_mut(index)
                    && *state == RecordState::Scheduled
                {
                    *state = RecordState::InFlight;
                    self.publish();
                }
            }
            WorkerEvent::Completed(completion) => self.complete(completion),
        }
    }

    fn complete(&mut self, completion: Completion) {
        let Completion {
            generation,
            index,
            outcome,
        } = completion;

        if generation != self.generation {
            log::debug!(
                "Discarding completion for record {index} of superseded batch {generation} (current: {})",
                self.generation
            );
            return;
        }

        let (Some(record), Some(state)) = (self.records.get_mut(index), self.states.get_mut(index))
        else {
            log::warn!("Completion for unknown record {index} in batch {generation}");
            return;
        };

        if state.is_terminal() {
            log::debug!("Record {index} already completed; ignoring duplicate");
            return;
        }

        *state = match outcome {
            Ok(coordinate) => {
                if !record.resolution.resolve(coordinate) {
                    log::debug!("Record {index} already had a coordinate; keeping it");
                }
                RecordState::Resolved
            }
            Err(_) => RecordState::Unresolved,
        };

        self.publish();
        let progress = self.tracker.record_completion();

        if progress.is_done() {
            let resolved = self.states.iter().filter(|s| **s == RecordState::Resolved).count();
            log::info!(
                "Batch {generation} complete: {resolved}/{} addresses resolved",
                progress.total
            );
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(Arc::new(BatchSnapshot {
            generation: self.generation,
            records: self.records.clone(),
            states: self.states.clone(),
        }));
    }
}
