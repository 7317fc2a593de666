//! Index Module
//!
//! Immutable per-group snapshots of the key space.
//!
//! ## Responsibilities
//! - Hold entries strictly ascending by key, no duplicates
//! - O(log n) point lookups by binary search
//! - Build modified copies for writers; never mutate in place
//!
//! ## Data Structure Choice
//! A sorted `Vec<Entry>`:
//! - Binary search stays valid at every publication point
//! - Whole-vector copy on write keeps published snapshots immutable
//! - Entry payloads are reference counted, so copying a snapshot copies
//!   handles, not bytes

mod entry;
mod table;

pub use entry::Entry;
pub use table::Index;

/// Record identifier, unique within a group
pub type Key = u64;
