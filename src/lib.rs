//! # kstore
//!
//! A small in-memory key-value store for short binary records with:
//! - A fixed number of independent groups (namespaces), allocated once
//! - Lock-free readers that always see one complete snapshot
//! - Copy-on-write writers, serialized per group
//! - Epoch-based deferred reclamation of superseded snapshots
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Registry                              │
//! │          (group allocation, id validation, routing)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼────────────┬────────────┐
//!          ▼            ▼            ▼            ▼
//!   ┌─────────────┐                        ┌─────────────┐
//!   │   Group 0   │          ...           │   Group 3   │
//!   │ writer lock │                        │ writer lock │
//!   └──────┬──────┘                        └──────┬──────┘
//!          │ atomic swap                          │
//!          ▼                                      ▼
//!   ┌─────────────┐   retired   ┌─────────────┐
//!   │    Index    │ ──────────▶ │  Reclaimer  │
//!   │  (sorted)   │             │   (epoch)   │
//!   └─────────────┘             └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod boundary;
pub mod index;
pub mod reclaim;
pub mod snapshot;
pub mod group;
pub mod registry;
pub mod stress;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use boundary::{ArenaBoundary, CopyBoundary, CopyFault, Destination, RemoteAddr, Source};
pub use config::{Config, MAX_GROUPS};
pub use error::{ErrorKind, Result, StoreError};
pub use group::PutOutcome;
pub use index::{Entry, Index, Key};
pub use reclaim::ReclaimStats;
pub use registry::{GroupId, Registry};
pub use snapshot::Snapshot;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
