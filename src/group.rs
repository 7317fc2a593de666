//! Group
//!
//! One namespace: the currently published [`Index`] plus the lock that
//! serializes writers.
//!
//! ## Concurrency Model: Copy-on-write / Lock-free Readers
//!
//! - **Writes** (put/remove): serialized by `writer`
//!   - The replacement index is built from the current one under the lock
//!   - Published by a single atomic swap of `current`
//!   - The old index is retired to the [`Reclaimer`]
//!
//! - **Reads**: never touch `writer`
//!   - Pin an epoch guard, load `current`, work on that snapshot
//!   - A snapshot stays valid until the guard is dropped

use std::sync::atomic::Ordering;

use crossbeam::epoch::{self, Atomic, Owned};
use parking_lot::Mutex;

use crate::error::{Result, StoreError};
use crate::index::{Entry, Index, Key};
use crate::reclaim::Reclaimer;
use crate::registry::GroupId;
use crate::snapshot::Snapshot;

/// Result of a successful put
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The key was new; the group grew by one
    Inserted,

    /// An existing entry was superseded; the group size is unchanged
    Replaced,
}

/// A single namespace of the store
pub struct Group {
    id: GroupId,

    /// Published snapshot; never null
    current: Atomic<Index>,

    /// Serializes writers (put/remove)
    writer: Mutex<()>,
}

impl Group {
    pub(crate) fn new(id: GroupId) -> Self {
        Self {
            id,
            current: Atomic::new(Index::new()),
            writer: Mutex::new(()),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Pin a read-side scope over the current snapshot
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot::pin(self.id, &self.current)
    }

    /// Entry count of the current snapshot
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Publish `entry`, replacing any entry with the same key
    ///
    /// `entry` is fully built by the caller, so the only failure left is
    /// allocating the new index, which happens before anything is published.
    pub(crate) fn put(&self, entry: Entry, reclaimer: &Reclaimer) -> Result<PutOutcome> {
        let key = entry.key();
        let _writer = self.writer.lock();
        let guard = epoch::pin();

        let current = self.current.load(Ordering::Acquire, &guard);
        // SAFETY: `current` is never null, and only writers holding the lock
        // retire it, so it stays alive for the rest of this scope.
        let index = unsafe { current.deref() };

        let (next, replaced) = index.with_upsert(entry)?;
        let outcome = match replaced {
            Some(_) => PutOutcome::Replaced,
            None => PutOutcome::Inserted,
        };
        let len = next.len();

        let old = self.current.swap(Owned::new(next), Ordering::AcqRel, &guard);
        // SAFETY: `old` was just unlinked by the swap above, under the lock.
        unsafe { reclaimer.retire(&guard, old, replaced) };

        tracing::trace!("group {} put key {}: {:?}, {} entries", self.id, key, outcome, len);
        Ok(outcome)
    }

    /// Unpublish `key`, returning the removed entry
    pub(crate) fn remove(&self, key: Key, reclaimer: &Reclaimer) -> Result<Entry> {
        let _writer = self.writer.lock();
        let guard = epoch::pin();

        let current = self.current.load(Ordering::Acquire, &guard);
        // SAFETY: see `put`.
        let index = unsafe { current.deref() };

        let (next, removed) = index
            .with_removal(key)?
            .ok_or(StoreError::KeyNotFound { group: self.id, key })?;
        let len = next.len();

        let old = self.current.swap(Owned::new(next), Ordering::AcqRel, &guard);
        // SAFETY: see `put`.
        unsafe { reclaimer.retire(&guard, old, Some(removed.clone())) };

        tracing::trace!("group {} removed key {}, {} entries", self.id, key, len);
        Ok(removed)
    }
}

impl Drop for Group {
    fn drop(&mut self) {
        // SAFETY: `&mut self` rules out readers (snapshots borrow the group)
        // and writers, so the current index can be freed immediately.
        unsafe {
            let current = self.current.load(Ordering::Relaxed, epoch::unprotected());
            if !current.is_null() {
                drop(current.into_owned());
            }
        }
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("id", &self.id)
            .field("len", &self.len())
            .finish()
    }
}
