//! Fixed-offset release scheduler.
//!
//! Item `i` of a batch is released no earlier than `i * min_interval` after
//! the batch's submission instant, and never sooner than `min_interval`
//! after the previous release of any batch. Releases happen in submission
//! order on a single dispatcher task; the work itself is spawned, so many
//! items may be in flight while the next one waits for its slot.
//!
//! The spacing is deliberately not adaptive: a fast provider response does
//! not pull the next release forward.
//!
//! All timing uses [`tokio::time::Instant`], so tests can drive the
//! scheduler on tokio's paused clock.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::BatchError;

/// Submission instant and generation of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchClock {
    generation: u64,
    start: Instant,
}

impl BatchClock {
    /// Generation every item scheduled against this clock is tagged with.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Instant the batch was submitted.
    #[must_use]
    pub const fn start(&self) -> Instant {
        self.start
    }
}

struct Scheduled<T> {
    generation: u64,
    not_before: Instant,
    item: T,
}

/// Releases items to a worker at a fixed cadence.
pub struct Scheduler<T> {
    min_interval: Duration,
    queue: mpsc::UnboundedSender<Scheduled<T>>,
    active_generation: watch::Sender<u64>,
    dispatcher: JoinHandle<()>,
}

impl<T: Send + 'static> Scheduler<T> {
    /// Starts the dispatcher task.
    ///
    /// `worker` is called once per released item; the future it returns is
    /// spawned onto the runtime and not awaited by the dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::InvalidInterval`] if `min_interval` is zero.
    pub fn spawn<F, Fut>(min_interval: Duration, worker: F) -> Result<Self, BatchError>
    where
        F: Fn(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if min_interval.is_zero() {
            return Err(BatchError::InvalidInterval);
        }

        let (queue, rx) = mpsc::unbounded_channel();
        let (active_generation, active_rx) = watch::channel(0);
        let dispatcher = tokio::spawn(dispatch(rx, active_rx, min_interval, worker));

        Ok(Self {
            min_interval,
            queue,
            active_generation,
            dispatcher,
        })
    }
}

impl<T> Scheduler<T> {
    /// Configured spacing between releases.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Captures the submission instant for a new batch.
    #[must_use]
    pub fn begin_batch(&self, generation: u64) -> BatchClock {
        BatchClock {
            generation,
            start: Instant::now(),
        }
    }

    /// Queues `item` as the `index`-th entry of the batch. Never blocks.
    ///
    /// Returns the earliest instant the item may be released.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::SchedulerClosed`] if the dispatcher has
    /// stopped.
    pub fn schedule(&self, clock: &BatchClock, item: T, index: usize) -> Result<Instant, BatchError> {
        let slots = u32::try_from(index).unwrap_or(u32::MAX);
        let not_before = clock.start + self.min_interval.saturating_mul(slots);

        self.queue
            .send(Scheduled {
                generation: clock.generation,
                not_before,
                item,
            })
            .map_err(|_| BatchError::SchedulerClosed)?;

        Ok(not_before)
    }

    /// Cancels every queued item tagged with a generation older than
    /// `generation`.
    ///
    /// Cancelled items are dropped without taking a release slot, including
    /// one the dispatcher is currently waiting on. Items already released
    /// are unaffected.
    pub fn supersede(&self, generation: u64) {
        self.active_generation.send_if_modified(|active| {
            if generation > *active {
                *active = generation;
                true
            } else {
                false
            }
        });
    }
}

impl<T> Drop for Scheduler<T> {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

async fn dispatch<T, F, Fut>(
    mut queue: mpsc::UnboundedReceiver<Scheduled<T>>,
    mut active_generation: watch::Receiver<u64>,
    min_interval: Duration,
    worker: F,
) where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut next_release: Option<Instant> = None;

    while let Some(job) = queue.recv().await {
        if !wait_for_slot(
            job.generation,
            job.not_before,
            next_release,
            &mut active_generation,
        )
        .await
        {
            log::trace!("Dropping superseded item of batch {}", job.generation);
            continue;
        }

        next_release = Some(Instant::now() + min_interval);
        tokio::spawn(worker(job.item));
    }
}

/// Sleeps until an item of `generation` due at `not_before` may be
/// released. Returns `false` if its batch was superseded before the slot
/// arrived.
///
/// Must not borrow the item across an await: `T` is only `Send`.
async fn wait_for_slot(
    generation: u64,
    not_before: Instant,
    next_release: Option<Instant>,
    active_generation: &mut watch::Receiver<u64>,
) -> bool {
    let target = next_release.map_or(not_before, |cursor| cursor.max(not_before));

    loop {
        if generation < *active_generation.borrow_and_update() {
            return false;
        }

        tokio::select! {
            () = tokio::time::sleep_until(target) => return true,
            changed = active_generation.changed() => {
                if changed.is_err() {
                    // Scheduler handle is gone; nothing can cancel us now.
                    tokio::time::sleep_until(target).await;
                    return true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    const INTERVAL: Duration = Duration::from_millis(1300);

    type Releases = Arc<Mutex<Vec<(u64, usize, Instant)>>>;

    fn recording_scheduler() -> (Scheduler<(u64, usize)>, Releases) {
        let releases: Releases = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&releases);
        let scheduler = Scheduler::spawn(INTERVAL, move |(generation, index): (u64, usize)| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock()
                    .unwrap()
                    .push((generation, index, Instant::now()));
            }
        })
        .unwrap();
        (scheduler, releases)
    }

    #[tokio::test]
    async fn rejects_zero_interval() {
        let result = Scheduler::spawn(Duration::ZERO, |(): ()| async {});
        assert!(matches!(result, Err(BatchError::InvalidInterval)));
    }

    #[tokio::test(start_paused = true)]
    async fn releases_at_fixed_offsets_in_submission_order() {
        let (scheduler, releases) = recording_scheduler();
        let clock = scheduler.begin_batch(1);

        for index in 0..5 {
            let not_before = scheduler.schedule(&clock, (1, index), index).unwrap();
            assert_eq!(not_before, clock.start() + INTERVAL * u32::try_from(index).unwrap());
        }

        tokio::time::sleep(INTERVAL * 10).await;

        let releases = releases.lock().unwrap().clone();
        assert_eq!(releases.len(), 5);
        for (position, (_, index, at)) in releases.iter().enumerate() {
            assert_eq!(*index, position, "released out of order");
            let offset = *at - clock.start();
            assert!(
                offset >= INTERVAL * u32::try_from(position).unwrap(),
                "item {position} released early at {offset:?}"
            );
        }
        for pair in releases.windows(2) {
            assert!(pair[1].2 - pair[0].2 >= INTERVAL);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_does_not_block_caller() {
        let (scheduler, releases) = recording_scheduler();
        let clock = scheduler.begin_batch(1);
        let before = Instant::now();

        for index in 0..100 {
            scheduler.schedule(&clock, (1, index), index).unwrap();
        }

        assert_eq!(Instant::now(), before);
        tokio::task::yield_now().await;
        assert!(releases.lock().unwrap().len() <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spacing_holds_across_batches() {
        let (scheduler, releases) = recording_scheduler();

        let first = scheduler.begin_batch(1);
        scheduler.schedule(&first, (1, 0), 0).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Second batch's first item would be due immediately, but the
        // previous release was only 100ms ago.
        let second = scheduler.begin_batch(2);
        scheduler.schedule(&second, (2, 0), 0).unwrap();
        tokio::time::sleep(INTERVAL * 3).await;

        let releases = releases.lock().unwrap().clone();
        assert_eq!(releases.len(), 2);
        assert!(releases[1].2 - releases[0].2 >= INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_items_are_dropped_without_taking_a_slot() {
        let (scheduler, releases) = recording_scheduler();

        let first = scheduler.begin_batch(1);
        for index in 0..5 {
            scheduler.schedule(&first, (1, index), index).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        scheduler.supersede(2);
        let second = scheduler.begin_batch(2);
        for index in 0..2 {
            scheduler.schedule(&second, (2, index), index).unwrap();
        }
        tokio::time::sleep(INTERVAL * 10).await;

        let releases = releases.lock().unwrap().clone();
        let tags: Vec<(u64, usize)> = releases.iter().map(|(g, i, _)| (*g, *i)).collect();
        assert_eq!(tags, vec![(1, 0), (2, 0), (2, 1)]);

        // Batch 2 starts one interval after batch 1's only release, not
        // after batch 1's cancelled tail.
        for pair in releases.windows(2) {
            let gap = pair[1].2 - pair[0].2;
            assert!(gap >= INTERVAL && gap < INTERVAL + Duration::from_millis(10), "gap {gap:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn accepts_send_but_not_sync_items() {
        use std::cell::Cell;

        let released = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&released);
        let scheduler = Scheduler::spawn(INTERVAL, move |item: Cell<usize>| {
            let sink = Arc::clone(&sink);
            async move { sink.lock().unwrap().push(item.get()) }
        })
        .unwrap();

        let clock = scheduler.begin_batch(1);
        for index in 0..3 {
            scheduler.schedule(&clock, Cell::new(index), index).unwrap();
        }
        tokio::time::sleep(INTERVAL * 3).await;

        assert_eq!(*released.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn supersede_ignores_older_generations() {
        let (scheduler, releases) = recording_scheduler();
        scheduler.supersede(3);
        scheduler.supersede(2);

        let clock = scheduler.begin_batch(3);
        scheduler.schedule(&clock, (3, 0), 0).unwrap();
        tokio::time::sleep(INTERVAL).await;

        assert_eq!(releases.lock().unwrap().len(), 1);
    }
}
