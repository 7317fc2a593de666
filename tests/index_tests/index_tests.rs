//! Tests for Index
//!
//! These tests verify:
//! - Binary search and point lookups
//! - Copy-on-write insert/replace/remove builders
//! - The source index is never modified
//! - Sorted order under arbitrary operation sequences (proptest)

use std::collections::BTreeMap;

use kstore::index::{Entry, Index, Key};
use kstore::GroupId;
use proptest::prelude::*;

// =============================================================================
// Helper Functions
// =============================================================================

const GROUP: GroupId = GroupId::new(0);

fn entry(key: Key, payload: &[u8]) -> Entry {
    Entry::new(GROUP, key, payload.to_vec())
}

fn index_of(keys: &[Key]) -> Index {
    Index::from_entries(keys.iter().map(|&k| entry(k, format!("v{}", k).as_bytes())))
}

fn keys_of(index: &Index) -> Vec<Key> {
    index.keys().collect()
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_new_index_is_empty() {
    let index = Index::new();
    assert!(index.is_empty());
    assert_eq!(index.len(), 0);
    assert_eq!(index.get(1), None);
    assert_eq!(index.search(42), Err(0));
}

#[test]
fn test_search_found_and_insertion_points() {
    let index = index_of(&[10, 20, 30]);

    assert_eq!(index.search(10), Ok(0));
    assert_eq!(index.search(30), Ok(2));
    assert_eq!(index.search(5), Err(0));
    assert_eq!(index.search(25), Err(2));
    assert_eq!(index.search(99), Err(3));
}

#[test]
fn test_get_returns_entry() {
    let index = index_of(&[1, 2, 3]);

    let found = index.get(2).unwrap();
    assert_eq!(found.key(), 2);
    assert_eq!(found.payload(), b"v2");
    assert_eq!(found.group(), GROUP);
}

#[test]
fn test_from_entries_sorts_and_keeps_last_duplicate() {
    let index = Index::from_entries(vec![entry(5, b"a"), entry(1, b"b"), entry(5, b"c")]);

    assert_eq!(keys_of(&index), vec![1, 5]);
    assert_eq!(index.get(5).unwrap().payload(), b"c");
    assert!(index.is_strictly_ascending());
}

#[test]
fn test_tail_starts_at_first_key_not_below() {
    let index = index_of(&[10, 20, 30]);

    let tail: Vec<Key> = index.tail(15).iter().map(Entry::key).collect();
    assert_eq!(tail, vec![20, 30]);

    let tail: Vec<Key> = index.tail(20).iter().map(Entry::key).collect();
    assert_eq!(tail, vec![20, 30]);

    assert!(index.tail(31).is_empty());
}

// =============================================================================
// Copy-on-write Builder Tests
// =============================================================================

#[test]
fn test_upsert_inserts_in_order() {
    let index = index_of(&[1, 5]);

    let (next, replaced) = index.with_upsert(entry(3, b"c")).unwrap();

    assert!(replaced.is_none());
    assert_eq!(keys_of(&next), vec![1, 3, 5]);
    assert_eq!(keys_of(&index), vec![1, 5]); // source untouched
}

#[test]
fn test_upsert_at_both_ends() {
    let index = index_of(&[5]);

    let (next, _) = index.with_upsert(entry(1, b"x")).unwrap();
    let (next, _) = next.with_upsert(entry(9, b"y")).unwrap();

    assert_eq!(keys_of(&next), vec![1, 5, 9]);
}

#[test]
fn test_upsert_replaces_existing() {
    let index = Index::from_entries(vec![entry(100, b"hello")]);

    let (next, replaced) = index.with_upsert(entry(100, b"hi")).unwrap();

    assert_eq!(next.len(), 1);
    assert_eq!(next.get(100).unwrap().payload(), b"hi");
    assert_eq!(replaced.unwrap().payload(), b"hello");
    assert_eq!(index.get(100).unwrap().payload(), b"hello"); // source untouched
}

#[test]
fn test_removal_shifts_left() {
    let index = index_of(&[1, 3, 5]);

    let (next, removed) = index.with_removal(3).unwrap().unwrap();

    assert_eq!(removed.key(), 3);
    assert_eq!(keys_of(&next), vec![1, 5]);
    assert_eq!(keys_of(&index), vec![1, 3, 5]);
}

#[test]
fn test_removal_of_missing_key() {
    let index = index_of(&[1, 3]);
    assert!(index.with_removal(2).unwrap().is_none());
}

#[test]
fn test_removal_of_last_entry() {
    let index = index_of(&[7]);

    let (next, _) = index.with_removal(7).unwrap().unwrap();

    assert!(next.is_empty());
}

#[test]
fn test_zero_length_payload_is_an_entry() {
    let index = Index::new();

    let (next, _) = index.with_upsert(entry(1, b"")).unwrap();

    let found = next.get(1).unwrap();
    assert!(found.is_empty());
    assert_eq!(found.len(), 0);
}

#[test]
fn test_extreme_keys() {
    let index = index_of(&[u64::MAX, 0, u64::MAX / 2]);
    assert_eq!(keys_of(&index), vec![0, u64::MAX / 2, u64::MAX]);
}

// =============================================================================
// Model-based Tests
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Put(Key, Vec<u8>),
    Remove(Key),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u64..32, prop::collection::vec(any::<u8>(), 0..8)).prop_map(|(k, v)| Op::Put(k, v)),
        1 => (0u64..32).prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn prop_index_matches_btreemap(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let mut index = Index::new();
        let mut model: BTreeMap<Key, Vec<u8>> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Put(key, value) => {
                    let (next, replaced) = index.with_upsert(entry(key, &value)).unwrap();
                    let previous = model.insert(key, value);
                    prop_assert_eq!(replaced.map(|e| e.payload().to_vec()), previous);
                    index = next;
                }
                Op::Remove(key) => {
                    let removed = index.with_removal(key).unwrap();
                    let previous = model.remove(&key);
                    match removed {
                        Some((next, entry)) => {
                            prop_assert_eq!(Some(entry.payload().to_vec()), previous);
                            index = next;
                        }
                        None => prop_assert!(previous.is_none()),
                    }
                }
            }
            prop_assert!(index.is_strictly_ascending());
        }

        let actual: Vec<(Key, Vec<u8>)> = index.iter().map(|e| (e.key(), e.payload().to_vec())).collect();
        let expected: Vec<(Key, Vec<u8>)> = model.into_iter().collect();
        prop_assert_eq!(actual, expected);
    }
}
