//! Live position polling with background metadata backfill.
//!
//! Each tick fetches the latest positions and emits them merged with
//! whatever trip metadata is cached at that moment. Trains without cached
//! metadata get a timetable lookup submitted to the [`ThrottledExecutor`];
//! its result lands in the [`MetadataStore`] and shows up on a later tick.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use ratakartta_core::model::{CacheKey, EnrichedPosition, PositionRecord, TripMetadata};

use crate::enrich::lock_or_recover;
use crate::enrich::source::{PositionFeed, TimetableSource};
use crate::enrich::store::MetadataStore;
use crate::enrich::throttle::ThrottledExecutor;
use crate::error::EnrichResult;

/// The enriched positions produced by one poll tick.
pub type Snapshot = Arc<Vec<EnrichedPosition>>;

type InFlight = Arc<Mutex<HashSet<CacheKey>>>;

/// Marks a cache key as having a lookup queued or running.
///
/// The mark is removed when the guard drops, i.e. on every way a backfill
/// task can end: success, upstream error, panic, or being discarded
/// unexecuted.
struct InFlightGuard {
    in_flight: InFlight,
    key: CacheKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock_or_recover(&self.in_flight).remove(&self.key);
    }
}

/// Polls live positions and backfills their trip metadata.
pub struct PositionPoller {
    feed: Arc<dyn PositionFeed>,
    timetables: Arc<dyn TimetableSource>,
    store: Arc<MetadataStore>,
    executor: ThrottledExecutor,
    in_flight: InFlight,
}

impl PositionPoller {
    pub fn new(
        feed: Arc<dyn PositionFeed>,
        timetables: Arc<dyn TimetableSource>,
        store: Arc<MetadataStore>,
        executor: ThrottledExecutor,
    ) -> Self {
        Self {
            feed,
            timetables,
            store,
            executor,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    pub fn executor(&self) -> &ThrottledExecutor {
        &self.executor
    }

    /// Number of keys with a lookup queued or running.
    pub fn in_flight(&self) -> usize {
        lock_or_recover(&self.in_flight).len()
    }

    /// Fetch the latest positions and enrich them.
    pub async fn tick(&self) -> EnrichResult<Vec<EnrichedPosition>> {
        let positions = self.feed.latest_positions().await?;
        Ok(self.enrich(positions))
    }

    /// Merge cached metadata into `positions`, in order, scheduling a
    /// lookup for every train whose metadata is missing.
    ///
    /// Lookups are only submitted here, never awaited, so their results
    /// are not visible in the returned positions.
    pub fn enrich(&self, positions: Vec<PositionRecord>) -> Vec<EnrichedPosition> {
        let mut scheduled = 0usize;
        let enriched: Vec<EnrichedPosition> = positions
            .into_iter()
            .map(|position| {
                let key = self.store.day_key(position.train_number);
                let metadata = self.store.get_key(&key);
                if metadata.is_none() && self.schedule_backfill(key) {
                    scheduled += 1;
                }
                EnrichedPosition::new(position, metadata)
            })
            .collect();

        log::debug!(
            "Enriched {} positions, scheduled {} lookups ({} queued)",
            enriched.len(),
            scheduled,
            self.executor.pending()
        );
        enriched
    }

    /// Submit a lookup for `key` unless one is already in flight.
    fn schedule_backfill(&self, key: CacheKey) -> bool {
        if !lock_or_recover(&self.in_flight).insert(key) {
            return false;
        }
        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            key,
        };
        let task = backfill(
            Arc::clone(&self.timetables),
            Arc::clone(&self.store),
            guard,
        );

        // On rejection the task, and with it the guard, is dropped here.
        match self.executor.submit(task) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Timetable lookup for {} not queued: {}", key, e);
                false
            }
        }
    }

    /// Run the poll loop on the current runtime: one tick immediately,
    /// then one per `interval`.
    ///
    /// The poller, and with it its executor, lives inside the loop task;
    /// stopping the returned handle stops both timers.
    pub fn spawn(self, interval: Duration) -> PollerHandle {
        let (tx, rx) = watch::channel(Snapshot::default());

        let job = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.tick().await {
                    Ok(positions) => {
                        log::info!(
                            "Polled {} positions ({} cached trips)",
                            positions.len(),
                            self.store.memory_len()
                        );
                        tx.send_replace(Arc::new(positions));
                    }
                    Err(e) => {
                        log::error!("Position poll failed: {}", e);
                    }
                }
            }
        });

        PollerHandle { snapshots: rx, job }
    }
}

impl std::fmt::Debug for PositionPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionPoller")
            .field("store", &self.store)
            .field("executor", &self.executor)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

/// Fetch the timetable for `guard.key` and cache the derived metadata.
async fn backfill(
    timetables: Arc<dyn TimetableSource>,
    store: Arc<MetadataStore>,
    guard: InFlightGuard,
) {
    let key = guard.key;
    match timetables.timetable(key.day(), key.train()).await {
        Ok(found) => {
            let metadata = TripMetadata::from_timetables(&found);
            if metadata.is_empty() {
                log::debug!("No departure or arrival rows for {}", key);
            }
            store.set_key(&key, metadata);
        }
        Err(e) if e.is_rate_limited() => {
            log::warn!("Rate limit hit looking up {}, dropping lookup", key);
        }
        Err(e) => {
            log::error!("Timetable lookup for {} failed: {}", key, e);
        }
    }
    drop(guard);
}

/// Handle to a running poll loop.
#[derive(Debug)]
pub struct PollerHandle {
    snapshots: watch::Receiver<Snapshot>,
    job: JoinHandle<()>,
}

impl PollerHandle {
    /// A receiver notified after every successful tick.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// The most recent snapshot (empty before the first tick).
    pub fn latest(&self) -> Snapshot {
        Arc::clone(&self.snapshots.borrow())
    }

    /// Stop polling. Lookups already running are left to finish.
    pub fn shutdown(&self) {
        self.job.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.job.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.job.abort();
    }
}
