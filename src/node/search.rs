//! # Search-Result Arithmetic
//!
//! Binary searches over records and markers return a signed *search index*:
//! a non-negative value is a hit at that index, a negative value encodes
//! the insertion point where the probe would be placed to keep the array
//! sorted. The helpers below convert between the two readings.
//!
//! The encoding is `-(insertion_point + 1)`, so insertion point 0 maps to
//! -1 and the two value ranges never overlap.

use std::cmp::Ordering;

/// True when `search_index` encodes an insertion point rather than a hit.
#[inline]
pub fn is_insertion_point(search_index: i32) -> bool {
    search_index < 0
}

/// Decodes an insertion point back to the index it encodes.
#[inline]
pub fn to_index(insertion_point: i32) -> i32 {
    -insertion_point - 1
}

/// Encodes `index` as an insertion point.
#[inline]
pub fn to_insertion_point(index: i32) -> i32 {
    -(index + 1)
}

/// Collapses a miss to the index of the largest entry at or below the
/// probe, in `-1..size`. A hit passes through unchanged.
#[inline]
pub fn to_minus_one_based_index(search_index: i32) -> i32 {
    if is_insertion_point(search_index) {
        to_index(search_index) - 1
    } else {
        search_index
    }
}

/// Default key comparator: the key type's total order.
#[inline]
pub fn compare_keys<K: Ord>(a: &K, b: &K) -> Ordering {
    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_is_not_an_insertion_point() {
        assert!(!is_insertion_point(0));
        assert!(!is_insertion_point(7));
        assert!(is_insertion_point(-1));
        assert!(is_insertion_point(-8));
    }

    #[test]
    fn insertion_point_round_trip() {
        for index in 0..10 {
            let encoded = to_insertion_point(index);
            assert!(is_insertion_point(encoded));
            assert_eq!(to_index(encoded), index);
        }
    }

    #[test]
    fn insertion_point_zero_is_minus_one() {
        assert_eq!(to_insertion_point(0), -1);
        assert_eq!(to_index(-1), 0);
    }

    #[test]
    fn minus_one_based_collapses_misses() {
        // a miss before index 0 lands at -1
        assert_eq!(to_minus_one_based_index(to_insertion_point(0)), -1);
        // a miss before index 3 lands at 2
        assert_eq!(to_minus_one_based_index(to_insertion_point(3)), 2);
        // hits pass through
        assert_eq!(to_minus_one_based_index(5), 5);
    }

    #[test]
    fn default_comparator_orders_integers() {
        assert_eq!(compare_keys(&1, &2), Ordering::Less);
        assert_eq!(compare_keys(&2, &2), Ordering::Equal);
        assert_eq!(compare_keys(&3, &2), Ordering::Greater);
    }
}
