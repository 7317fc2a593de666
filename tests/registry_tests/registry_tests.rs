//! Tests for Registry
//!
//! These tests verify:
//! - Group allocation and exhaustion
//! - Group id validation on every operation
//! - put/get/remove semantics and group sizes
//! - Config validation and payload limits
//! - Groups are independent of each other

use kstore::config::{Config, MAX_GROUPS};
use kstore::{ErrorKind, GroupId, PutOutcome, Registry, StoreError};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_registry() -> Registry {
    Registry::init(Config::default()).unwrap()
}

fn setup_with_group() -> (Registry, GroupId) {
    let registry = setup_registry();
    let group = registry.allocate_group().unwrap();
    (registry, group)
}

// =============================================================================
// Group Allocation Tests
// =============================================================================

#[test]
fn test_first_group_is_zero() {
    let registry = setup_registry();

    assert_eq!(registry.allocate_group().unwrap(), GroupId::new(0));
    assert_eq!(registry.allocated_groups(), 1);
}

#[test]
fn test_allocation_is_monotonic_until_exhausted() {
    let registry = setup_registry();

    let ids: Vec<u32> = (0..4).map(|_| registry.allocate_group().unwrap().as_u32()).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);

    let err = registry.allocate_group().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
}

#[test]
fn test_failed_allocation_does_not_advance_counter() {
    let registry = setup_registry();
    for _ in 0..MAX_GROUPS {
        registry.allocate_group().unwrap();
    }

    for _ in 0..10 {
        assert!(registry.allocate_group().is_err());
    }
    assert_eq!(registry.allocated_groups(), MAX_GROUPS);
}

#[test]
fn test_smaller_registry_exhausts_earlier() {
    let registry = Registry::init(Config::builder().max_groups(2).build()).unwrap();

    registry.allocate_group().unwrap();
    registry.allocate_group().unwrap();

    assert_eq!(registry.max_groups(), 2);
    assert!(matches!(
        registry.allocate_group(),
        Err(StoreError::ResourceExhausted(_))
    ));
}

#[test]
fn test_concurrent_allocation_hands_out_unique_ids() {
    let registry = setup_registry();
    let shared = &registry;

    let mut ids: Vec<u32> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(move || shared.allocate_group().ok()))
            .collect();
        handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .map(GroupId::as_u32)
            .collect()
    });
    ids.sort_unstable();

    assert_eq!(ids, vec![0, 1, 2, 3]);
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_config_rejects_zero_groups() {
    let err = Registry::init(Config::builder().max_groups(0).build()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_config_rejects_too_many_groups() {
    let err = Registry::init(Config::builder().max_groups(MAX_GROUPS + 1).build()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_payload_limit_is_enforced() {
    let registry = Registry::init(Config::builder().max_entry_len(4).build()).unwrap();
    let group = registry.allocate_group().unwrap();

    registry.put(group, 1, b"four").unwrap();
    let err = registry.put(group, 2, b"fives").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(registry.group_size(group).unwrap(), 1);
}

#[test]
fn test_default_config_has_no_payload_limit() {
    let (registry, group) = setup_with_group();
    let big = vec![0x5A; 2 * 1024 * 1024];

    assert_eq!(registry.put(group, 1, &big).unwrap(), PutOutcome::Inserted);
    assert_eq!(registry.get(group, 1).unwrap().payload(), &big[..]);
}

// =============================================================================
// Group Validation Tests
// =============================================================================

#[test]
fn test_unallocated_group_is_not_found() {
    let registry = setup_registry();
    let group = GroupId::new(0);

    assert_eq!(registry.group_size(group), Err(StoreError::GroupNotFound(group)));
    assert!(registry.put(group, 1, b"x").unwrap_err().is_not_found());
    assert!(registry.get(group, 1).unwrap_err().is_not_found());
    assert!(registry.remove(group, 1).unwrap_err().is_not_found());
    assert!(registry.snapshot(group).is_err());
}

#[test]
fn test_out_of_range_group_is_not_found() {
    let (registry, _) = setup_with_group();
    let group = GroupId::new(17);

    assert_eq!(registry.group_size(group), Err(StoreError::GroupNotFound(group)));
}

#[test]
fn test_new_group_is_empty() {
    let (registry, group) = setup_with_group();
    assert_eq!(registry.group_size(group).unwrap(), 0);
    assert_eq!(registry.group(group).unwrap().id(), group);
    assert!(registry.group(group).unwrap().is_empty());
}

// =============================================================================
// Write Path Tests
// =============================================================================

#[test]
fn test_put_then_get() {
    let (registry, group) = setup_with_group();

    assert_eq!(registry.put(group, 100, b"hello").unwrap(), PutOutcome::Inserted);

    let entry = registry.get(group, 100).unwrap();
    assert_eq!(entry.payload(), b"hello");
    assert_eq!(entry.len(), 5);
    assert_eq!(entry.key(), 100);
    assert_eq!(entry.group(), group);
}

#[test]
fn test_overwrite_keeps_size() {
    let (registry, group) = setup_with_group();

    registry.put(group, 100, b"hello").unwrap();
    assert_eq!(registry.put(group, 100, b"hi").unwrap(), PutOutcome::Replaced);

    let entry = registry.get(group, 100).unwrap();
    assert_eq!(entry.payload(), b"hi");
    assert_eq!(entry.len(), 2);
    assert_eq!(registry.group_size(group).unwrap(), 1);
}

#[test]
fn test_owned_entry_survives_overwrite() {
    let (registry, group) = setup_with_group();

    registry.put(group, 1, b"old").unwrap();
    let held = registry.get(group, 1).unwrap();
    registry.put(group, 1, b"new").unwrap();

    let shared = held.bytes();
    assert_eq!(held.payload(), b"old");
    assert_eq!(&shared[..], b"old");
    assert_eq!(registry.get(group, 1).unwrap().payload(), b"new");
}

#[test]
fn test_remove_shrinks_group() {
    let (registry, group) = setup_with_group();
    registry.put(group, 1, b"a").unwrap();
    registry.put(group, 2, b"b").unwrap();

    let removed = registry.remove(group, 1).unwrap();

    assert_eq!(removed.payload(), b"a");
    assert_eq!(registry.group_size(group).unwrap(), 1);
    assert_eq!(
        registry.get(group, 1).unwrap_err(),
        StoreError::KeyNotFound { group, key: 1 }
    );
}

#[test]
fn test_remove_missing_key_is_not_found() {
    let (registry, group) = setup_with_group();
    registry.put(group, 1, b"a").unwrap();

    let err = registry.remove(group, 2).unwrap_err();

    assert_eq!(err, StoreError::KeyNotFound { group, key: 2 });
    assert_eq!(registry.group_size(group).unwrap(), 1);
}

#[test]
fn test_put_after_remove() {
    let (registry, group) = setup_with_group();

    registry.put(group, 9, b"first").unwrap();
    registry.remove(group, 9).unwrap();
    assert_eq!(registry.put(group, 9, b"second").unwrap(), PutOutcome::Inserted);

    assert_eq!(registry.get(group, 9).unwrap().payload(), b"second");
}

#[test]
fn test_zero_length_payload() {
    let (registry, group) = setup_with_group();

    registry.put(group, 3, b"").unwrap();

    let entry = registry.get(group, 3).unwrap();
    assert!(entry.is_empty());
    assert_eq!(registry.group_size(group).unwrap(), 1);
}

#[test]
fn test_with_entry_borrows_view() {
    let (registry, group) = setup_with_group();
    registry.put(group, 4, b"view").unwrap();

    let len = registry.with_entry(group, 4, |entry| entry.len()).unwrap();
    assert_eq!(len, 4);

    assert!(registry.with_entry(group, 5, |entry| entry.len()).is_err());
}

// =============================================================================
// Group Independence Tests
// =============================================================================

#[test]
fn test_groups_do_not_share_keys() {
    let registry = setup_registry();
    let a = registry.allocate_group().unwrap();
    let b = registry.allocate_group().unwrap();

    registry.put(a, 1, b"in a").unwrap();
    registry.put(b, 1, b"in b").unwrap();
    registry.remove(a, 1).unwrap();

    assert!(registry.get(a, 1).unwrap_err().is_not_found());
    assert_eq!(registry.get(b, 1).unwrap().payload(), b"in b");
    assert_eq!(registry.get(b, 1).unwrap().group(), b);
}

// =============================================================================
// Reclamation Tests
// =============================================================================

#[test]
fn test_every_write_retires_one_index() {
    let (registry, group) = setup_with_group();

    registry.put(group, 1, b"a").unwrap(); // insert
    registry.put(group, 1, b"b").unwrap(); // overwrite
    registry.remove(group, 1).unwrap(); // remove
    let _ = registry.remove(group, 1); // not found: nothing retired

    let stats = registry.reclaim_stats();
    assert_eq!(stats.retired_indexes, 3);
    assert_eq!(stats.retired_entries, 2);
}

#[test]
fn test_quiesce_reclaims_everything() {
    let registry = Registry::init(Config::builder().eager_reclaim(true).build()).unwrap();
    let group = registry.allocate_group().unwrap();

    for round in 0..50u64 {
        registry.put(group, round % 5, &round.to_le_bytes()).unwrap();
    }

    let stats = registry.quiesce();
    assert_eq!(stats.retired_indexes, 50);
    assert_eq!(stats.retired_entries, 45);
    assert!(stats.is_settled(), "pending after quiesce: {:?}", stats);
}
