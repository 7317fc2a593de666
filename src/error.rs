//! Error types for kstore
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::boundary::{CopyFault, RemoteAddr};
use crate::index::Key;
use crate::registry::GroupId;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for kstore operations
///
/// Every failure is local to the call that produced it. Write failures are
/// raised before publication, so the group's visible state never changes on
/// an error path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Group {0} is not allocated")]
    GroupNotFound(GroupId),

    #[error("Key {key} not found in group {group}")]
    KeyNotFound { group: GroupId, key: Key },

    // -------------------------------------------------------------------------
    // Argument Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Resource Errors
    // -------------------------------------------------------------------------
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    // -------------------------------------------------------------------------
    // Boundary Errors
    // -------------------------------------------------------------------------
    #[error("Copy fault at {addr:#x} ({len} bytes)")]
    CopyFault { addr: RemoteAddr, len: usize },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`StoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    ResourceExhausted,
    OutOfMemory,
    CopyFault,
    Config,
}

impl StoreError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::GroupNotFound(_) | StoreError::KeyNotFound { .. } => ErrorKind::NotFound,
            StoreError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            StoreError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            StoreError::OutOfMemory(_) => ErrorKind::OutOfMemory,
            StoreError::CopyFault { .. } => ErrorKind::CopyFault,
            StoreError::Config(_) => ErrorKind::Config,
        }
    }

    /// True for unknown groups and unknown keys
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<CopyFault> for StoreError {
    fn from(fault: CopyFault) -> Self {
        StoreError::CopyFault {
            addr: fault.addr,
            len: fault.len,
        }
    }
}
