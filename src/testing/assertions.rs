//! Assertions over collected dataset contents.
//!
//! Item order inside one partition is deterministic in this engine, so most
//! helpers compare partitions in order. The unordered variants are for results
//! flattened across partitions, where only the multiset of items is fixed.

use crate::engine::Engine;
use crate::rdd::{Data, Rdd};
use crate::testing::reference;
use anyhow::Result;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two collections are equal in order and content.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
///
/// # Example
///
/// ```
/// use minispark::testing::assert_collections_equal;
///
/// assert_collections_equal(&["A", "B"], &["A", "B"]);
/// ```
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(
            a, e,
            "Collection mismatch at index {i}:\n  Expected: {expected:?}\n  Actual: {actual:?}"
        );
    }
}

/// Assert that two collections hold the same items with the same
/// multiplicities, in any order.
///
/// # Panics
///
/// Panics listing the items missing from and extra in `actual`.
///
/// # Example
///
/// ```
/// use minispark::testing::assert_collections_unordered_equal;
///
/// assert_collections_unordered_equal(&[3, 1, 2, 1], &[1, 1, 2, 3]);
/// ```
pub fn assert_collections_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    let mut balance: HashMap<&T, i64> = HashMap::new();
    for e in expected {
        *balance.entry(e).or_default() += 1;
    }
    for a in actual {
        *balance.entry(a).or_default() -= 1;
    }
    let missing: Vec<_> = balance.iter().filter(|(_, n)| **n > 0).map(|(k, _)| *k).collect();
    let extra: Vec<_> = balance.iter().filter(|(_, n)| **n < 0).map(|(k, _)| *k).collect();
    assert!(
        missing.is_empty() && extra.is_empty(),
        "Collection content mismatch:\n  Missing: {missing:?}\n  Extra: {extra:?}\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
}

/// Assert partition-by-partition equality, item order included.
///
/// # Panics
///
/// Panics naming the first partition that differs.
pub fn assert_partitions_equal<T: Debug + PartialEq>(actual: &[Vec<T>], expected: &[Vec<T>]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Partition count mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(
            a, e,
            "Partition {i} differs:\n  Expected: {e:?}\n  Actual: {a:?}"
        );
    }
}

/// Assert that every element satisfies `predicate`.
///
/// # Panics
///
/// Panics on the first element that does not.
pub fn assert_all<T: Debug>(collection: &[T], predicate: impl Fn(&T) -> bool) {
    for (i, item) in collection.iter().enumerate() {
        assert!(
            predicate(item),
            "Predicate failed for element at index {i}:\n  Element: {item:?}"
        );
    }
}

/// Run `rdd` on `engine` and assert it agrees, partition by partition, with
/// the single-threaded [`reference::evaluate`].
///
/// Evaluation goes through the engine first, so a failing task surfaces as the
/// returned error rather than a reference mismatch.
///
/// # Errors
///
/// Returns an error if either evaluation fails.
///
/// # Panics
///
/// Panics if the two disagree.
pub fn assert_matches_reference<T>(rdd: &Rdd<T>, engine: &Engine) -> Result<()>
where
    T: Data + Clone + Debug + PartialEq,
{
    let actual = rdd.collect_partitions(engine)?;
    let expected = reference::evaluate(rdd)?;
    assert_partitions_equal(&actual, &expected);
    assert_eq!(rdd.count(engine)?, reference::count(rdd)?);
    Ok(())
}

/// Assert that `rdd` and every one of its partitions are materialized.
///
/// # Panics
///
/// Panics if any partition flag is still unset.
pub fn assert_fully_materialized<T: Data>(rdd: &Rdd<T>) {
    let flags = rdd.materialized_partitions();
    assert!(
        rdd.is_materialized() && flags.iter().all(|m| *m),
        "node {} not fully materialized: {flags:?}",
        rdd.id()
    );
}
