//! Copy Boundary
//!
//! The seam between the store and memory that lives in a different address
//! space. The store never dereferences a foreign address itself; it asks the
//! host's [`CopyBoundary`] to move bytes across and only distinguishes a
//! local copy (plain slice) from a cross-boundary copy.
//!
//! ## Responsibilities
//! - Define the host copy-in/copy-out contract
//! - Describe read destinations and write sources on either side
//! - Provide [`ArenaBoundary`], a flat simulated address space

use std::mem::size_of;

use parking_lot::RwLock;
use thiserror::Error;

use crate::error::{Result, StoreError};
use crate::index::Key;

/// Address in a foreign address space
pub type RemoteAddr = u64;

/// Size of one key when written across the boundary (native endian)
pub const KEY_SIZE: usize = size_of::<Key>();

/// Raised by a [`CopyBoundary`] when the foreign range is not accessible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("copy fault at {addr:#x} ({len} bytes)")]
pub struct CopyFault {
    /// First foreign address of the failed transfer
    pub addr: RemoteAddr,

    /// Requested transfer length
    pub len: usize,
}

/// Host-provided primitive that copies bytes across an address-space boundary
pub trait CopyBoundary: Send + Sync {
    /// Fill `dst` from foreign memory starting at `src`
    fn copy_in(&self, src: RemoteAddr, dst: &mut [u8]) -> std::result::Result<(), CopyFault>;

    /// Write `src` to foreign memory starting at `dst`
    fn copy_out(&self, dst: RemoteAddr, src: &[u8]) -> std::result::Result<(), CopyFault>;
}

// =============================================================================
// Destinations and Sources
// =============================================================================

/// Where a read operation delivers its output
pub enum Destination<'a, T> {
    /// A buffer in the caller's own address space
    Local(&'a mut [T]),

    /// A foreign buffer reached through the host boundary
    Remote {
        boundary: &'a dyn CopyBoundary,
        addr: RemoteAddr,
    },
}

impl<'a, T> Destination<'a, T> {
    /// Local destination over a mutable slice
    pub fn local(buf: &'a mut [T]) -> Self {
        Destination::Local(buf)
    }

    /// Foreign destination at `addr`
    pub fn remote(boundary: &'a dyn CopyBoundary, addr: RemoteAddr) -> Self {
        Destination::Remote { boundary, addr }
    }

    /// Fail unless `count` elements fit. Foreign buffers are sized by the
    /// caller, so only local slices are checked.
    pub(crate) fn ensure_room(&self, count: usize) -> Result<()> {
        match self {
            Destination::Local(buf) if buf.len() < count => Err(StoreError::InvalidArgument(
                format!("destination holds {} elements, {} required", buf.len(), count),
            )),
            _ => Ok(()),
        }
    }
}

impl Destination<'_, u8> {
    /// Copy `src` to the start of the destination
    pub(crate) fn write_bytes(&mut self, src: &[u8]) -> Result<()> {
        self.ensure_room(src.len())?;
        match self {
            Destination::Local(buf) => {
                buf[..src.len()].copy_from_slice(src);
                Ok(())
            }
            Destination::Remote { boundary, addr } => {
                boundary.copy_out(*addr, src).map_err(|fault| {
                    tracing::warn!("copy_out of {} bytes failed: {}", src.len(), fault);
                    StoreError::from(fault)
                })
            }
        }
    }
}

impl Destination<'_, Key> {
    /// Store `key` in element `slot`
    pub(crate) fn write_key(&mut self, slot: usize, key: Key) -> Result<()> {
        match self {
            Destination::Local(buf) => match buf.get_mut(slot) {
                Some(cell) => {
                    *cell = key;
                    Ok(())
                }
                None => Err(StoreError::InvalidArgument(format!(
                    "key slot {} outside destination of {}",
                    slot,
                    buf.len()
                ))),
            },
            Destination::Remote { boundary, addr } => {
                let target = (slot as u64)
                    .checked_mul(KEY_SIZE as u64)
                    .and_then(|off| addr.checked_add(off))
                    .ok_or(CopyFault {
                        addr: *addr,
                        len: KEY_SIZE,
                    })?;
                boundary.copy_out(target, &key.to_ne_bytes()).map_err(|fault| {
                    tracing::warn!("copy_out of key slot {} failed: {}", slot, fault);
                    StoreError::from(fault)
                })
            }
        }
    }
}

/// Where a write operation takes its payload from
pub enum Source<'a> {
    /// Bytes in the caller's own address space
    Local(&'a [u8]),

    /// `len` foreign bytes at `addr`, reached through the host boundary
    Remote {
        boundary: &'a dyn CopyBoundary,
        addr: RemoteAddr,
        len: usize,
    },
}

impl Source<'_> {
    /// Payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            Source::Local(bytes) => bytes.len(),
            Source::Remote { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `dst` (exactly `self.len()` bytes) with the payload
    pub(crate) fn fill(&self, dst: &mut [u8]) -> Result<()> {
        match self {
            Source::Local(bytes) => {
                dst.copy_from_slice(bytes);
                Ok(())
            }
            Source::Remote { boundary, addr, .. } => {
                boundary.copy_in(*addr, dst).map_err(|fault| {
                    tracing::warn!("copy_in of {} bytes failed: {}", dst.len(), fault);
                    StoreError::from(fault)
                })
            }
        }
    }
}

// =============================================================================
// Arena Boundary
// =============================================================================

/// A simulated foreign address space: `size` bytes mapped at `base`
///
/// Any transfer touching an address outside `[base, base + size)` faults,
/// which is how a host copy primitive reports a bad user pointer.
#[derive(Debug)]
pub struct ArenaBoundary {
    base: RemoteAddr,
    memory: RwLock<Vec<u8>>,
}

impl ArenaBoundary {
    /// Map a zeroed window of `size` bytes at `base`
    pub fn new(base: RemoteAddr, size: usize) -> Self {
        Self {
            base,
            memory: RwLock::new(vec![0u8; size]),
        }
    }

    /// First mapped address
    pub fn base(&self) -> RemoteAddr {
        self.base
    }

    /// Size of the mapped window
    pub fn size(&self) -> usize {
        self.memory.read().len()
    }

    /// Copy `len` bytes out of the arena (inspection helper)
    pub fn load(&self, addr: RemoteAddr, len: usize) -> std::result::Result<Vec<u8>, CopyFault> {
        let memory = self.memory.read();
        let range = self.window(addr, len, memory.len())?;
        Ok(memory[range].to_vec())
    }

    /// Copy `bytes` into the arena (setup helper)
    pub fn store(&self, addr: RemoteAddr, bytes: &[u8]) -> std::result::Result<(), CopyFault> {
        let mut memory = self.memory.write();
        let range = self.window(addr, bytes.len(), memory.len())?;
        memory[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Read `count` native-endian keys starting at `addr`
    pub fn load_keys(&self, addr: RemoteAddr, count: usize) -> std::result::Result<Vec<Key>, CopyFault> {
        let len = count.checked_mul(KEY_SIZE).ok_or(CopyFault { addr, len: usize::MAX })?;
        let raw = self.load(addr, len)?;
        Ok(raw
            .chunks_exact(KEY_SIZE)
            .map(|chunk| {
                let mut word = [0u8; KEY_SIZE];
                word.copy_from_slice(chunk);
                Key::from_ne_bytes(word)
            })
            .collect())
    }

    /// Translate a foreign range into an index range of the backing vector
    fn window(
        &self,
        addr: RemoteAddr,
        len: usize,
        size: usize,
    ) -> std::result::Result<std::ops::Range<usize>, CopyFault> {
        let fault = CopyFault { addr, len };
        let start = addr
            .checked_sub(self.base)
            .and_then(|off| usize::try_from(off).ok())
            .ok_or(fault)?;
        let end = start.checked_add(len).ok_or(fault)?;
        if end > size {
            return Err(fault);
        }
        Ok(start..end)
    }
}

impl CopyBoundary for ArenaBoundary {
    fn copy_in(&self, src: RemoteAddr, dst: &mut [u8]) -> std::result::Result<(), CopyFault> {
        let memory = self.memory.read();
        let range = self.window(src, dst.len(), memory.len())?;
        dst.copy_from_slice(&memory[range]);
        Ok(())
    }

    fn copy_out(&self, dst: RemoteAddr, src: &[u8]) -> std::result::Result<(), CopyFault> {
        self.store(dst, src)
    }
}
