//! Snapshot
//!
//! A read-side protection scope made visible in the type system.
//!
//! A [`Snapshot`] pins the current epoch and holds on to exactly one
//! published [`Index`]. Everything borrowed from it (entries, key iterators)
//! lives no longer than the snapshot, and the index cannot be reclaimed
//! until the snapshot is dropped. Snapshots are `!Send`: the guard belongs
//! to the thread that pinned it.

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::slice;
use std::sync::atomic::Ordering;

use crossbeam::epoch::{self, Atomic, Guard};

use crate::index::{Entry, Index, Key};
use crate::registry::GroupId;

/// One consistent view of a group
pub struct Snapshot<'g> {
    group: GroupId,

    /// Points into the index loaded under `_guard`
    index: NonNull<Index>,

    _guard: Guard,

    /// Ties the snapshot to the owning group
    _group: PhantomData<&'g Atomic<Index>>,
}

impl<'g> Snapshot<'g> {
    pub(crate) fn pin(group: GroupId, current: &'g Atomic<Index>) -> Self {
        let guard = epoch::pin();
        let shared = current.load(Ordering::Acquire, &guard);
        // SAFETY: a group's index pointer is never null, and the object it
        // points to is only reclaimed after `guard` is released.
        let index = NonNull::from(unsafe { shared.deref() });

        Self {
            group,
            index,
            _guard: guard,
            _group: PhantomData,
        }
    }

    /// The underlying index
    pub fn index(&self) -> &Index {
        // SAFETY: the pointee outlives the guard we hold.
        unsafe { self.index.as_ref() }
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn len(&self) -> usize {
        self.index().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index().is_empty()
    }

    pub fn get(&self, key: Key) -> Option<&Entry> {
        self.index().get(key)
    }

    /// Entries ascending by key
    pub fn iter(&self) -> slice::Iter<'_, Entry> {
        self.index().iter()
    }

    /// Keys ascending
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.index().keys()
    }

    /// Entries with key >= `from`, ascending
    pub fn range_from(&self, from: Key) -> slice::Iter<'_, Entry> {
        self.index().tail(from).iter()
    }
}

impl<'s> IntoIterator for &'s Snapshot<'_> {
    type Item = &'s Entry;
    type IntoIter = slice::Iter<'s, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::fmt::Debug for Snapshot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("group", &self.group)
            .field("len", &self.len())
            .finish()
    }
}
