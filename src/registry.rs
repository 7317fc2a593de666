//! Registry
//!
//! The store's entry point: owns every group, hands out group ids and routes
//! each operation to the addressed group.
//!
//! ## Responsibilities
//! - Construct all groups (and their writer locks) up front
//! - Allocate group ids monotonically, never past the configured maximum
//! - Validate group ids on every call
//! - Bridge read results to local or foreign destinations

use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::boundary::{Destination, Source};
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::group::{Group, PutOutcome};
use crate::index::{Entry, Key};
use crate::reclaim::{ReclaimStats, Reclaimer};
use crate::snapshot::Snapshot;

/// Identifier of an allocated group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u32);

impl GroupId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    fn slot(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for GroupId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The grouped key-value store
///
/// ## Concurrency:
/// - `groups`: fixed at construction; each group synchronizes itself
/// - `allocated`: atomic counter, only ever grows, capped at `groups.len()`
/// - All methods use `&self`; share the registry with `Arc` or a scope
pub struct Registry {
    config: Config,

    /// Every group the registry can ever hand out, built at init
    groups: Box<[Group]>,

    /// Number of groups handed out so far
    allocated: AtomicUsize,

    reclaimer: Reclaimer,
}

impl Registry {
    /// Build a registry with every group ready to use
    ///
    /// Must complete before any other operation; ownership of the returned
    /// value enforces that.
    pub fn init(config: Config) -> Result<Self> {
        config.validate()?;

        let groups = (0..config.max_groups)
            .map(|slot| Group::new(GroupId(slot as u32)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let reclaimer = Reclaimer::new(config.eager_reclaim);

        tracing::debug!(
            "registry initialized: {} groups, max entry {} bytes, eager_reclaim={}",
            config.max_groups,
            config.max_entry_len,
            config.eager_reclaim
        );

        Ok(Self {
            config,
            groups,
            allocated: AtomicUsize::new(0),
            reclaimer,
        })
    }

    // =========================================================================
    // Group Bookkeeping
    // =========================================================================

    /// Hand out the next group id
    ///
    /// Ids start at 0 and are never reused. Once every group is allocated,
    /// further calls fail and leave the counter untouched.
    pub fn allocate_group(&self) -> Result<GroupId> {
        let max = self.groups.len();
        match self
            .allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
        {
            Ok(slot) => {
                let id = GroupId(slot as u32);
                tracing::debug!("allocated group {} ({}/{})", id, slot + 1, max);
                Ok(id)
            }
            Err(_) => {
                tracing::warn!("group allocation refused: all {} groups in use", max);
                Err(StoreError::ResourceExhausted(format!(
                    "all {} groups are allocated",
                    max
                )))
            }
        }
    }

    /// Resolve an allocated group
    pub fn group(&self, id: GroupId) -> Result<&Group> {
        if id.slot() < self.allocated.load(Ordering::Acquire) {
            Ok(&self.groups[id.slot()])
        } else {
            Err(StoreError::GroupNotFound(id))
        }
    }

    /// Entry count of a group, read without the writer lock
    pub fn group_size(&self, id: GroupId) -> Result<usize> {
        Ok(self.group(id)?.len())
    }

    /// Number of groups allocated so far
    pub fn allocated_groups(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    /// Capacity of the registry
    pub fn max_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Store `bytes` under `key`, replacing any previous entry
    pub fn put(&self, id: GroupId, key: Key, bytes: &[u8]) -> Result<PutOutcome> {
        self.put_from(id, key, Source::Local(bytes))
    }

    /// Store a payload taken from `source`, replacing any previous entry
    ///
    /// The payload is copied (through the boundary if it is foreign) before
    /// the group's writer lock is taken; a fault or allocation failure
    /// leaves the group unchanged.
    pub fn put_from(&self, id: GroupId, key: Key, source: Source<'_>) -> Result<PutOutcome> {
        let group = self.group(id)?;

        if source.len() > self.config.max_entry_len {
            return Err(StoreError::InvalidArgument(format!(
                "payload of {} bytes exceeds limit of {}",
                source.len(),
                self.config.max_entry_len
            )));
        }

        let entry = Entry::copy_from(id, key, &source)?;
        group.put(entry, &self.reclaimer)
    }

    /// Delete `key`, returning the entry that was removed
    pub fn remove(&self, id: GroupId, key: Key) -> Result<Entry> {
        self.group(id)?.remove(key, &self.reclaimer)
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Pin a consistent view of a group
    pub fn snapshot(&self, id: GroupId) -> Result<Snapshot<'_>> {
        Ok(self.group(id)?.snapshot())
    }

    /// Owned copy of an entry (the payload is shared, not duplicated)
    pub fn get(&self, id: GroupId, key: Key) -> Result<Entry> {
        self.with_entry(id, key, Entry::clone)
    }

    /// Run `f` on an entry while it is protected by a read-side scope
    pub fn with_entry<R>(&self, id: GroupId, key: Key, f: impl FnOnce(&Entry) -> R) -> Result<R> {
        let snapshot = self.snapshot(id)?;
        let entry = snapshot
            .get(key)
            .ok_or(StoreError::KeyNotFound { group: id, key })?;
        Ok(f(entry))
    }

    /// Copy up to `length` payload bytes starting at `offset` into `dst`
    ///
    /// Returns the number of bytes copied, which is shorter than `length`
    /// when the payload ends first.
    pub fn read(
        &self,
        id: GroupId,
        key: Key,
        offset: usize,
        length: usize,
        mut dst: Destination<'_, u8>,
    ) -> Result<usize> {
        let snapshot = self.snapshot(id)?;
        let entry = snapshot
            .get(key)
            .ok_or(StoreError::KeyNotFound { group: id, key })?;

        if offset >= entry.len() {
            return Err(StoreError::InvalidArgument(format!(
                "offset {} outside entry of {} bytes",
                offset,
                entry.len()
            )));
        }

        let n = length.min(entry.len() - offset);
        dst.write_bytes(&entry.payload()[offset..offset + n])?;
        Ok(n)
    }

    /// Copy the smallest `capacity` keys, ascending, into `dst`
    ///
    /// A result equal to `capacity` may or may not be truncated; compare
    /// with [`Registry::group_size`] to tell.
    pub fn list_keys(&self, id: GroupId, capacity: usize, mut dst: Destination<'_, Key>) -> Result<usize> {
        let snapshot = self.snapshot(id)?;
        dst.ensure_room(capacity)?;

        let mut count = 0;
        for key in snapshot.keys().take(capacity) {
            dst.write_key(count, key)?;
            count += 1;
        }
        Ok(count)
    }

    /// Visit entries ascending by key until `visitor` breaks
    ///
    /// The visitor runs inside the read-side scope and must not write to the
    /// same group.
    pub fn for_each<B, F>(&self, id: GroupId, visitor: F) -> Result<ControlFlow<B>>
    where
        F: FnMut(&Entry) -> ControlFlow<B>,
    {
        let snapshot = self.snapshot(id)?;
        Ok(snapshot.iter().try_for_each(visitor))
    }

    // =========================================================================
    // Reclamation
    // =========================================================================

    pub fn reclaim_stats(&self) -> ReclaimStats {
        self.reclaimer.stats()
    }

    /// Push deferred reclamation forward; see [`Reclaimer::quiesce`]
    pub fn quiesce(&self) -> ReclaimStats {
        self.reclaimer.quiesce()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("allocated", &self.allocated_groups())
            .field("groups", &self.groups)
            .finish()
    }
}
