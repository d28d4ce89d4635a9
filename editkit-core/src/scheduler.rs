//! Debounced canvas updates.
//!
//! Bursts of visible mutations (slider drags, resize notifications) collapse
//! into a single sync carrying the latest requested state. A request arriving
//! while a sync is running is dropped rather than queued.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::SchedulerConfig;

type SyncFn<S> = Arc<dyn Fn(S) -> BoxFuture<'static, ()> + Send + Sync>;

/// Scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Accepted `schedule` calls.
    pub scheduled: u64,
    /// Pending syncs replaced by a newer request.
    pub superseded: u64,
    /// Requests dropped because a sync was running.
    pub skipped_in_flight: u64,
    /// Syncs that ran to completion.
    pub synced: u64,
}

#[derive(Default)]
struct Counters {
    scheduled: AtomicU64,
    superseded: AtomicU64,
    skipped_in_flight: AtomicU64,
    synced: AtomicU64,
}

#[derive(Default)]
struct Pending {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

/// Clears the in-flight flag when the sync finishes or is dropped.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Trailing-edge debounce with an in-flight guard.
pub struct UpdateScheduler<S> {
    config: SchedulerConfig,
    sync: SyncFn<S>,
    pending: Arc<Mutex<Pending>>,
    in_flight: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl<S: Send + 'static> UpdateScheduler<S> {
    /// Create a scheduler that runs `sync` with the latest state once
    /// `config.debounce_ms` passes without a new request.
    #[must_use]
    pub fn new<F, Fut>(config: SchedulerConfig, sync: F) -> Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            config,
            sync: Arc::new(move |state| sync(state).boxed()),
            pending: Arc::new(Mutex::new(Pending::default())),
            in_flight: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Request a sync with `state`, restarting the debounce timer.
    ///
    /// Returns false if the request was dropped: a sync is running, or no
    /// tokio runtime is available.
    pub fn schedule(&self, state: S) -> bool {
        let mut pending = lock_pending(&self.pending);

        if self.in_flight.load(Ordering::SeqCst) {
            self.counters.skipped_in_flight.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Sync in flight; dropping update request");
            return false;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime; dropping update request");
            return false;
        };

        if let Some(previous) = pending.handle.take() {
            if !previous.is_finished() {
                previous.abort();
                self.counters.superseded.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Superseded pending update");
            }
        }
        pending.generation += 1;
        let generation = pending.generation;

        let delay = self.config.debounce();
        let sync = Arc::clone(&self.sync);
        let slot = Arc::clone(&self.pending);
        let in_flight = Arc::clone(&self.in_flight);
        let counters = Arc::clone(&self.counters);

        pending.handle = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let guard = {
                let mut pending = lock_pending(&slot);
                // A newer request or cancel() won the race against abort().
                if pending.generation != generation {
                    return;
                }
                pending.handle = None;
                in_flight.store(true, Ordering::SeqCst);
                InFlightGuard(in_flight)
            };
            sync(state).await;
            drop(guard);
            counters.synced.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Update synced");
        }));
        self.counters.scheduled.fetch_add(1, Ordering::Relaxed);
        true
    }
}

impl<S> UpdateScheduler<S> {
    /// Abort the pending sync, if any. A running sync is not interrupted.
    pub fn cancel(&self) {
        let mut pending = lock_pending(&self.pending);
        pending.generation += 1;
        if let Some(handle) = pending.handle.take() {
            handle.abort();
            tracing::trace!("Cancelled pending update");
        }
    }

    /// Whether a sync is waiting for its debounce to elapse.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        lock_pending(&self.pending)
            .handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Whether a sync is currently running.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            scheduled: self.counters.scheduled.load(Ordering::Relaxed),
            superseded: self.counters.superseded.load(Ordering::Relaxed),
            skipped_in_flight: self.counters.skipped_in_flight.load(Ordering::Relaxed),
            synced: self.counters.synced.load(Ordering::Relaxed),
        }
    }
}

impl<S> Drop for UpdateScheduler<S> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<S> fmt::Debug for UpdateScheduler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("config", &self.config)
            .field("syncing", &self.is_syncing())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

fn lock_pending(pending: &Mutex<Pending>) -> MutexGuard<'_, Pending> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Container dimensions reported by the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a dimensions value.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Debounced resize handling that ignores repeated identical dimensions.
#[derive(Debug)]
pub struct ResizeScheduler {
    inner: UpdateScheduler<Dimensions>,
    last: Mutex<Option<Dimensions>>,
    unchanged: AtomicU64,
}

impl ResizeScheduler {
    /// Create a resize scheduler calling `sync` with the new dimensions.
    #[must_use]
    pub fn new<F, Fut>(config: SchedulerConfig, sync: F) -> Self
    where
        F: Fn(Dimensions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            inner: UpdateScheduler::new(config, sync),
            last: Mutex::new(None),
            unchanged: AtomicU64::new(0),
        }
    }

    /// Report the container's current dimensions.
    ///
    /// Returns true if a sync was scheduled; false if the dimensions match
    /// the last recorded ones or the request was dropped.
    pub fn observe_dimensions(&self, width: u32, height: u32) -> bool {
        let dimensions = Dimensions::new(width, height);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if *last == Some(dimensions) {
            self.unchanged.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Dimensions unchanged at {width}x{height}");
            return false;
        }
        let scheduled = self.inner.schedule(dimensions);
        if scheduled {
            *last = Some(dimensions);
        }
        scheduled
    }

    /// Last dimensions a sync was scheduled for.
    #[must_use]
    pub fn last_dimensions(&self) -> Option<Dimensions> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Notifications ignored because the dimensions did not change.
    #[must_use]
    pub fn unchanged_count(&self) -> u64 {
        self.unchanged.load(Ordering::Relaxed)
    }

    /// Abort the pending sync, if any.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Counters of the underlying scheduler.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.inner.stats()
    }
}
