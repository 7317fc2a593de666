//! Index implementation
//!
//! Sorted-vector snapshot with copy-on-write builders.

use std::slice;

use crate::error::{Result, StoreError};

use super::{Entry, Key};

/// Ordered, binary-searchable collection of entries for one group
///
/// An `Index` is never modified after it is published. Writers derive a new
/// index from the current one with [`Index::with_upsert`] or
/// [`Index::with_removal`] and publish that instead.
#[derive(Debug, Clone, Default)]
pub struct Index {
    /// Strictly ascending by key
    entries: Vec<Entry>,
}

impl Index {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from entries in any order; later duplicates win
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut entries: Vec<Entry> = entries.into_iter().collect();
        // Stable sort keeps insertion order among equal keys, so keeping the
        // last of each run keeps the newest entry.
        entries.sort_by_key(Entry::key);
        let mut deduped: Vec<Entry> = Vec::with_capacity(entries.len());
        for entry in entries {
            match deduped.last_mut() {
                Some(last) if last.key() == entry.key() => *last = entry,
                _ => deduped.push(entry),
            }
        }
        Self { entries: deduped }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binary search: `Ok(position)` if present, `Err(insertion point)` if not
    pub fn search(&self, key: Key) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by_key(&key, Entry::key)
    }

    /// Look up an entry by key
    pub fn get(&self, key: Key) -> Option<&Entry> {
        self.search(key).ok().map(|pos| &self.entries[pos])
    }

    /// All entries, ascending by key
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Entries with key >= `from`, ascending
    pub fn tail(&self, from: Key) -> &[Entry] {
        let start = match self.search(from) {
            Ok(pos) | Err(pos) => pos,
        };
        &self.entries[start..]
    }

    pub fn iter(&self) -> slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Keys ascending
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.entries.iter().map(Entry::key)
    }

    /// True when keys are strictly ascending (no duplicates)
    pub fn is_strictly_ascending(&self) -> bool {
        self.entries.windows(2).all(|pair| pair[0].key() < pair[1].key())
    }

    // =========================================================================
    // Copy-on-write Builders
    // =========================================================================

    /// Derive the index that results from writing `entry`
    ///
    /// Returns the new index and, on overwrite, the entry it replaced.
    pub fn with_upsert(&self, entry: Entry) -> Result<(Index, Option<Entry>)> {
        match self.search(entry.key()) {
            Ok(pos) => {
                let (index, old) = self.with_replaced(pos, entry)?;
                Ok((index, Some(old)))
            }
            Err(pos) => Ok((self.with_inserted(pos, entry)?, None)),
        }
    }

    /// Derive the index without `key`
    ///
    /// Returns `Ok(None)` when the key is absent.
    pub fn with_removal(&self, key: Key) -> Result<Option<(Index, Entry)>> {
        match self.search(key) {
            Ok(pos) => self.without(pos).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// One element longer: `entry` at `pos`, later elements shifted right
    fn with_inserted(&self, pos: usize, entry: Entry) -> Result<Index> {
        let mut entries = Self::allocate(self.entries.len() + 1)?;
        entries.extend_from_slice(&self.entries[..pos]);
        entries.push(entry);
        entries.extend_from_slice(&self.entries[pos..]);
        Ok(Index { entries })
    }

    /// Same length: position `pos` now holds `entry`
    fn with_replaced(&self, pos: usize, entry: Entry) -> Result<(Index, Entry)> {
        let mut entries = Self::allocate(self.entries.len())?;
        entries.extend_from_slice(&self.entries);
        let old = std::mem::replace(&mut entries[pos], entry);
        Ok((Index { entries }, old))
    }

    /// One element shorter: later elements shifted left
    fn without(&self, pos: usize) -> Result<(Index, Entry)> {
        let mut entries = Self::allocate(self.entries.len() - 1)?;
        entries.extend_from_slice(&self.entries[..pos]);
        entries.extend_from_slice(&self.entries[pos + 1..]);
        Ok((Index { entries }, self.entries[pos].clone()))
    }

    fn allocate(capacity: usize) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        entries.try_reserve_exact(capacity).map_err(|e| {
            tracing::warn!("index allocation of {} slots failed: {}", capacity, e);
            StoreError::OutOfMemory(format!("index of {} entries: {}", capacity, e))
        })?;
        Ok(entries)
    }
}

impl<'a> IntoIterator for &'a Index {
    type Item = &'a Entry;
    type IntoIter = slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
