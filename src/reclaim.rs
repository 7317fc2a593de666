//! Reclaimer
//!
//! Deferred memory reclamation for retired snapshots.
//!
//! A writer unlinks the old [`Index`] with an atomic swap, but readers that
//! pinned the epoch before the swap may still be walking it. Retirement
//! therefore hands the old index (and, on overwrite or removal, the entry it
//! dropped) to crossbeam's epoch collector, which runs the destructor only
//! once every guard that could have observed it has been released.
//!
//! Reclamation has no visible effect other than the counters exposed through
//! [`ReclaimStats`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::epoch::{self, Guard, Shared};

use crate::index::{Entry, Index};

/// Upper bound on pin/flush rounds spent by [`Reclaimer::quiesce`]
const QUIESCE_ROUNDS: usize = 10_000;

#[derive(Debug, Default)]
struct Counters {
    retired_indexes: AtomicU64,
    retired_entries: AtomicU64,
    reclaimed_indexes: AtomicU64,
    reclaimed_entries: AtomicU64,
}

/// Point-in-time view of reclamation progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimStats {
    pub retired_indexes: u64,
    pub retired_entries: u64,
    pub reclaimed_indexes: u64,
    pub reclaimed_entries: u64,
}

impl ReclaimStats {
    /// Retired objects still waiting for a grace period
    pub fn pending(&self) -> u64 {
        (self.retired_indexes - self.reclaimed_indexes) + (self.retired_entries - self.reclaimed_entries)
    }

    /// Everything retired so far has been reclaimed
    pub fn is_settled(&self) -> bool {
        self.pending() == 0
    }
}

/// Schedules destruction of retired snapshots after a grace period
#[derive(Debug)]
pub struct Reclaimer {
    /// Flush the thread-local garbage bag after each retirement
    eager: bool,

    /// Shared with pending destructors, which may outlive the reclaimer
    counters: Arc<Counters>,
}

impl Reclaimer {
    pub fn new(eager: bool) -> Self {
        Self {
            eager,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Retire an unlinked index and optionally the entry it no longer holds
    ///
    /// # Safety
    ///
    /// `index` must have been unlinked from its group (no new reader can load
    /// it) and must not be retired twice.
    pub(crate) unsafe fn retire(&self, guard: &Guard, index: Shared<'_, Index>, entry: Option<Entry>) {
        self.counters.retired_indexes.fetch_add(1, Ordering::Relaxed);
        if entry.is_some() {
            self.counters.retired_entries.fetch_add(1, Ordering::Relaxed);
        }

        let counters = Arc::clone(&self.counters);
        unsafe {
            guard.defer_unchecked(move || {
                drop(index.into_owned());
                counters.reclaimed_indexes.fetch_add(1, Ordering::Release);
                if let Some(entry) = entry {
                    drop(entry);
                    counters.reclaimed_entries.fetch_add(1, Ordering::Release);
                }
            });
        }

        if self.eager {
            guard.flush();
        }
    }

    pub fn stats(&self) -> ReclaimStats {
        // Reclaimed counts first: a retirement always happens-before its
        // destructor, so retired >= reclaimed in the result.
        let reclaimed_indexes = self.counters.reclaimed_indexes.load(Ordering::Acquire);
        let reclaimed_entries = self.counters.reclaimed_entries.load(Ordering::Acquire);
        ReclaimStats {
            retired_indexes: self.counters.retired_indexes.load(Ordering::Relaxed),
            retired_entries: self.counters.retired_entries.load(Ordering::Relaxed),
            reclaimed_indexes,
            reclaimed_entries,
        }
    }

    /// Pin and flush on the calling thread until the counters settle or the
    /// round budget runs out. Garbage still sitting in another live thread's
    /// local bag is out of reach, so with lazy reclamation the result may
    /// report pending work.
    pub fn quiesce(&self) -> ReclaimStats {
        for _ in 0..QUIESCE_ROUNDS {
            if self.stats().is_settled() {
                break;
            }
            let guard = epoch::pin();
            guard.flush();
            drop(guard);
            std::thread::yield_now();
        }

        let stats = self.stats();
        tracing::debug!(
            "quiesce: {} indexes and {} entries still pending",
            stats.retired_indexes - stats.reclaimed_indexes,
            stats.retired_entries - stats.reclaimed_entries
        );
        stats
    }
}
