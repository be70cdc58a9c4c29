//! # Node Scenario Tests
//!
//! End-to-end scenarios over single nodes: ordered inserts, hard and
//! tombstone deletes, marker re-indexing in internal nodes, heap
//! compaction, and split-tail moves. These tests drive the public node
//! API the way the tree layer does and check the layout invariants the
//! tree layer depends on.

use sebtree::encoding::{Encoder, I64Provider, StrEncoder, StrProvider};
use sebtree::node::search::{is_insertion_point, to_index, to_insertion_point};
use sebtree::node::SebTreeNode;
use sebtree::storage::PageHandle;
use sebtree::{HALF_SIZE, PAGE_SIZE, PAGE_SPACE, RECORDS_OFFSET};

type Node = SebTreeNode<I64Provider, StrProvider>;

fn create_leaf(page_index: u64, tombstone_delete: bool) -> Node {
    let page = PageHandle::new_zeroed(page_index);
    let mut node = SebTreeNode::new(page, I64Provider, StrProvider, tombstone_delete);
    node.begin_create().unwrap();
    node.create(true).unwrap();
    node
}

fn create_internal(page_index: u64) -> Node {
    let page = PageHandle::new_zeroed(page_index);
    let mut node = SebTreeNode::new(page, I64Provider, StrProvider, false);
    node.begin_create().unwrap();
    node.create(false).unwrap();
    node
}

fn insert(node: &mut Node, key: i64, value: &str) {
    let value = value.to_owned();
    let search_index = node.index_of(&key).unwrap();
    assert!(is_insertion_point(search_index), "duplicate key {key}");
    let value_size = StrEncoder.exact_size(&value);
    node.insert_value(search_index, &key, 8, &value, value_size)
        .unwrap();
}

fn insert_child(node: &mut Node, key: i64, pointer: u64) {
    let search_index = node.index_of(&key).unwrap();
    node.insert_pointer(to_index(search_index) as usize, &key, 8, pointer)
        .unwrap();
}

fn keys_of(node: &Node) -> Vec<i64> {
    (0..node.get_size()).map(|i| node.key_at(i).unwrap()).collect()
}

fn assert_sorted_and_within_bounds(node: &mut Node) {
    let keys = keys_of(node);
    assert!(keys.windows(2).all(|w| w[0] < w[1]), "keys not sorted: {keys:?}");

    let free_data_position = node.get_free_data_position().unwrap();
    assert!(free_data_position <= PAGE_SIZE);
    assert!(RECORDS_OFFSET <= free_data_position);
    // the free span is non-negative, i.e. slots and heap do not overlap
    node.get_free_bytes().unwrap();
}

mod leaf_operations {
    use super::*;

    #[test]
    fn out_of_order_inserts_read_back_sorted() {
        let mut node = create_leaf(1, false);

        insert(&mut node, 1, "a");
        insert(&mut node, 3, "c");
        insert(&mut node, 2, "b");

        assert_eq!(node.get_size(), 3);
        assert_eq!(keys_of(&node), vec![1, 2, 3]);
        let values: Vec<String> = (0..3).map(|i| node.value_at(i).unwrap()).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn hard_delete_returns_the_entry_bytes_to_the_free_span() {
        let mut node = create_leaf(1, false);
        insert(&mut node, 1, "a");
        insert(&mut node, 3, "c");
        insert(&mut node, 2, "b");

        let value_size = StrEncoder.exact_size(&"b".to_owned());
        let entry_size = node.full_entry_size(8, value_size).unwrap();
        let free_before = node.get_free_bytes().unwrap();

        node.delete(1, 8, node.value_size_at(1, false).unwrap())
            .unwrap();

        assert_eq!(node.get_size(), 2);
        assert_eq!(keys_of(&node), vec![1, 3]);
        assert_eq!(node.get_free_bytes().unwrap(), free_before + entry_size);
        assert_sorted_and_within_bounds(&mut node);
    }

    #[test]
    fn tombstone_delete_keeps_the_key_as_a_witness() {
        let mut node = create_leaf(1, true);
        insert(&mut node, 1, "a");
        insert(&mut node, 3, "c");
        insert(&mut node, 2, "b");

        node.delete(1, 8, node.value_size_at(1, false).unwrap())
            .unwrap();

        assert_eq!(node.get_size(), 3);
        assert!(node.is_tombstone_record(1).unwrap());
        assert_eq!(node.value_size_at(1, true).unwrap(), 0);
        assert_eq!(keys_of(&node), vec![1, 2, 3]);
        assert_sorted_and_within_bounds(&mut node);
    }

    #[test]
    fn keys_stay_sorted_through_mixed_operations() {
        let mut node = create_leaf(1, false);

        for key in [5i64, 1, 9, 3, 7, 2, 8, 4, 6] {
            insert(&mut node, key, &format!("v{key}"));
            assert_sorted_and_within_bounds(&mut node);
        }
        for index in [0usize, 3, 5] {
            let value_size = node.value_size_at(index, false).unwrap();
            node.delete(index, 8, value_size).unwrap();
            assert_sorted_and_within_bounds(&mut node);
        }
        for key in [10i64, 0] {
            insert(&mut node, key, "replacement value");
            assert_sorted_and_within_bounds(&mut node);
        }

        // every surviving record still decodes to what was stored
        for i in 0..node.get_size() {
            let key = node.key_at(i).unwrap();
            let value = node.value_at(i).unwrap();
            assert!(value == format!("v{key}") || value == "replacement value");
        }
    }

    #[test]
    fn inserted_records_are_found_again() {
        let mut node = create_leaf(1, false);
        for key in [20i64, 10, 40, 30] {
            insert(&mut node, key, &format!("value-{key}"));
        }

        for key in [10i64, 20, 30, 40] {
            let search_index = node.index_of(&key).unwrap();
            assert!(search_index >= 0, "key {key} not found");
            assert_eq!(
                node.value_at(search_index as usize).unwrap(),
                format!("value-{key}")
            );
        }
    }

    #[test]
    fn out_of_line_blobs_survive_a_neighbor_delete() {
        let mut node = create_leaf(1, false);
        let big = "x".repeat(99);
        let small = "y".repeat(49);
        insert(&mut node, 1, &big);
        insert(&mut node, 2, &small);

        let free_before = node.get_free_data_position().unwrap();
        let first_size = node.value_size_at(0, false).unwrap();
        node.delete(0, 8, first_size).unwrap();

        assert_eq!(node.value_at(0).unwrap(), small);
        assert_eq!(
            node.get_free_data_position().unwrap(),
            free_before + first_size
        );
        assert_sorted_and_within_bounds(&mut node);
    }
}

mod internal_operations {
    use super::*;

    #[test]
    fn pointer_insert_shifts_marker_indexes() {
        let mut node = create_internal(2);
        node.set_left_pointer(100).unwrap();
        insert_child(&mut node, 10, 101);
        insert_child(&mut node, 20, 102);
        insert_child(&mut node, 30, 103);
        node.insert_marker(0, 1, 7, 2).unwrap();

        insert_child(&mut node, 15, 104);

        assert_eq!(node.marker_at(0).unwrap().pointer_index, 2);
        assert_eq!(node.pointer_at(to_insertion_point(0)).unwrap(), 100);
        assert_eq!(node.pointer_at(0).unwrap(), 101);
        assert_eq!(node.pointer_at(1).unwrap(), 104);
        assert_eq!(node.pointer_at(2).unwrap(), 102);
        node.verify_markers().unwrap();
    }

    #[test]
    fn marker_indexes_shift_only_at_or_after_the_insert() {
        let mut node = create_internal(2);
        node.set_left_pointer(1).unwrap();
        for (key, pointer) in [(10i64, 11u64), (20, 12), (30, 13), (40, 14)] {
            insert_child(&mut node, key, pointer);
        }
        node.insert_marker(0, 0, 50, 1).unwrap();
        node.insert_marker(1, 2, 51, 1).unwrap();
        node.insert_marker(2, 3, 52, 1).unwrap();

        insert_child(&mut node, 25, 15);

        let indexes: Vec<usize> = (0..3)
            .map(|i| node.marker_at(i).unwrap().pointer_index)
            .collect();
        assert_eq!(indexes, vec![0, 3, 4]);
        node.verify_markers().unwrap();
    }
}

mod split_moves {
    use super::*;

    #[test]
    fn leaf_fills_then_splits_until_half_free() {
        let mut node = create_leaf(1, false);

        let mut key = 0i64;
        loop {
            let value = format!("value number {key:05}");
            let value_size = StrEncoder.exact_size(&value);
            let entry_size = node.full_entry_size(8, value_size).unwrap();
            if !node.delta_fits(entry_size).unwrap() {
                break;
            }
            let search_index = node.index_of(&key).unwrap();
            node.insert_value(search_index, &key, 8, &value, value_size)
                .unwrap();
            key += 1;
        }
        assert!(node.get_free_bytes().unwrap() < HALF_SIZE);
        let size_before = node.get_size();
        let keys_before = keys_of(&node);

        let entries_to_move = node.count_entries_to_move_until_half_free().unwrap();
        assert!(entries_to_move > 0);

        let mut destination = create_leaf(2, false);
        node.move_tail_to(&mut destination, entries_to_move).unwrap();

        assert_eq!(node.get_size(), size_before - entries_to_move);
        assert_eq!(destination.get_size(), entries_to_move);
        assert!(node.get_free_bytes().unwrap() >= HALF_SIZE);

        // the moved tail arrives in order at the front of the destination
        assert_eq!(
            keys_of(&destination),
            &keys_before[size_before - entries_to_move..]
        );
        assert_eq!(keys_of(&node), &keys_before[..size_before - entries_to_move]);
        assert_sorted_and_within_bounds(&mut node);
        assert_sorted_and_within_bounds(&mut destination);
    }

    #[test]
    fn leaf_move_compacts_the_source_heap() {
        let mut node = create_leaf(1, false);
        for key in 0..8i64 {
            insert(&mut node, key, &format!("padding padding {key}"));
        }
        // delete a couple of records so the surviving blob set is irregular
        for index in [5usize, 2] {
            let value_size = node.value_size_at(index, false).unwrap();
            node.delete(index, 8, value_size).unwrap();
        }

        let mut destination = create_leaf(2, false);
        node.move_tail_to(&mut destination, 3).unwrap();

        // after the rebuild the heap holds exactly the surviving blobs
        let blob_bytes: usize = (0..node.get_size())
            .map(|i| node.value_size_at(i, false).unwrap())
            .sum();
        assert_eq!(
            node.get_free_data_position().unwrap(),
            PAGE_SIZE - blob_bytes
        );

        for i in 0..node.get_size() {
            let key = node.key_at(i).unwrap();
            assert_eq!(node.value_at(i).unwrap(), format!("padding padding {key}"));
        }
        for i in 0..destination.get_size() {
            let key = destination.key_at(i).unwrap();
            assert_eq!(
                destination.value_at(i).unwrap(),
                format!("padding padding {key}")
            );
        }
    }

    #[test]
    fn leaf_move_preserves_tombstones() {
        let mut node = create_leaf(1, true);
        for key in 0..6i64 {
            insert(&mut node, key, &format!("value {key}"));
        }
        for index in [1usize, 4] {
            let value_size = node.value_size_at(index, false).unwrap();
            node.delete(index, 8, value_size).unwrap();
        }

        let mut destination = create_leaf(2, true);
        node.move_tail_to(&mut destination, 3).unwrap();

        assert_eq!(node.get_size(), 3);
        assert_eq!(destination.get_size(), 3);
        // record 4 moved as destination record 1 and stays a tombstone
        assert!(destination.is_tombstone_record(1).unwrap());
        assert!(!destination.is_tombstone_record(0).unwrap());
        // record 1 stayed behind as a tombstone
        assert!(node.is_tombstone_record(1).unwrap());
        assert_eq!(destination.value_at(0).unwrap(), "value 3");
        assert_eq!(destination.value_at(2).unwrap(), "value 5");
    }

    #[test]
    fn internal_move_rebases_the_moved_markers() {
        let mut node = create_internal(3);
        node.set_left_pointer(1).unwrap();
        for (key, pointer) in [(10i64, 11u64), (20, 12), (30, 13), (40, 14), (50, 15), (60, 16)] {
            insert_child(&mut node, key, pointer);
        }
        node.insert_marker(0, 0, 100, 1).unwrap();
        node.insert_marker(1, 3, 101, 2).unwrap();
        node.insert_marker(2, 5, 102, 3).unwrap();

        let mut destination = create_internal(4);
        node.move_tail_to(&mut destination, 2).unwrap();

        assert_eq!(node.get_size(), 4);
        assert_eq!(destination.get_size(), 2);
        assert_eq!(keys_of(&destination), vec![50, 60]);
        assert_eq!(destination.pointer_at(0).unwrap(), 15);
        assert_eq!(destination.pointer_at(1).unwrap(), 16);

        // the marker at pointer 5 moved and was rebased to pointer 1
        assert_eq!(destination.get_marker_count().unwrap(), 1);
        let moved = destination.marker_at(0).unwrap();
        assert_eq!(moved.pointer_index, 1);
        assert_eq!(moved.block_index, 102);
        assert_eq!(moved.block_pages_used, 3);

        // the first two markers stayed behind
        assert_eq!(node.get_marker_count().unwrap(), 2);
        assert_eq!(node.marker_at(0).unwrap().block_index, 100);
        assert_eq!(node.marker_at(1).unwrap().block_index, 101);
        node.verify_markers().unwrap();
        destination.verify_markers().unwrap();
    }

    #[test]
    fn internal_move_refuses_to_take_the_first_marker() {
        let mut node = create_internal(3);
        node.set_left_pointer(1).unwrap();
        for (key, pointer) in [(10i64, 11u64), (20, 12), (30, 13)] {
            insert_child(&mut node, key, pointer);
        }
        node.insert_marker(0, 2, 100, 1).unwrap();

        let mut destination = create_internal(4);
        let result = node.move_tail_to(&mut destination, 2);

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<sebtree::NodeError>(),
            Some(sebtree::NodeError::InvariantViolation(_))
        ));
    }
}

mod space_accounting {
    use super::*;

    #[test]
    fn free_bytes_start_at_the_full_page_space() {
        let mut node = create_leaf(1, false);
        assert_eq!(node.get_free_bytes().unwrap(), PAGE_SPACE);
    }

    #[test]
    fn every_insert_consumes_exactly_its_full_entry_size() {
        let mut node = create_leaf(1, false);

        for key in 0..32i64 {
            let value = "v".repeat((key as usize * 7) % 40);
            let value_size = StrEncoder.exact_size(&value);
            let expected = node.full_entry_size(8, value_size).unwrap();

            let free_before = node.get_free_bytes().unwrap();
            let search_index = node.index_of(&key).unwrap();
            node.insert_value(search_index, &key, 8, &value, value_size)
                .unwrap();

            assert_eq!(free_before - node.get_free_bytes().unwrap(), expected);
        }
    }

    #[test]
    fn idempotent_update_leaves_the_rest_of_the_page_untouched() {
        let mut node = create_leaf(1, false);
        insert(&mut node, 1, "alpha");
        insert(&mut node, 2, "beta");
        insert(&mut node, 3, "gamma");

        let snapshot: Vec<(i64, String)> = (0..3)
            .map(|i| (node.key_at(i).unwrap(), node.value_at(i).unwrap()))
            .collect();
        let free_before = node.get_free_data_position().unwrap();

        let value = "beta".to_owned();
        let size = StrEncoder.exact_size(&value);
        node.update_value(1, &value, size, size, false).unwrap();

        assert_eq!(node.get_free_data_position().unwrap(), free_before);
        for (i, (key, value)) in snapshot.iter().enumerate() {
            assert_eq!(node.key_at(i).unwrap(), *key);
            assert_eq!(node.value_at(i).unwrap(), *value);
        }
    }
}
