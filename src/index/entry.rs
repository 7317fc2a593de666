//! Entry definitions
//!
//! An immutable binary record identified by (group, key).

use bytes::Bytes;

use crate::boundary::Source;
use crate::error::{Result, StoreError};
use crate::registry::GroupId;

use super::Key;

/// A published record
///
/// The payload never changes once the entry is built; an update always
/// produces a new `Entry`. Cloning is cheap (the payload is shared).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    group: GroupId,
    key: Key,
    payload: Bytes,
}

impl Entry {
    /// Wrap an existing payload
    pub fn new(group: GroupId, key: Key, payload: impl Into<Bytes>) -> Self {
        Self {
            group,
            key,
            payload: payload.into(),
        }
    }

    /// Build an entry by copying `source`, reporting allocation failure
    /// instead of aborting
    pub(crate) fn copy_from(group: GroupId, key: Key, source: &Source<'_>) -> Result<Self> {
        let len = source.len();
        let mut buf = Vec::new();
        buf.try_reserve_exact(len).map_err(|e| {
            tracing::warn!("group {} key {}: payload allocation failed: {}", group, key, e);
            StoreError::OutOfMemory(format!("payload of {} bytes: {}", len, e))
        })?;
        buf.resize(len, 0);
        source.fill(&mut buf)?;

        Ok(Self::new(group, key, buf))
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn key(&self) -> Key {
        self.key
    }

    /// Payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Shared handle to the payload
    pub fn bytes(&self) -> Bytes {
        self.payload.clone()
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
