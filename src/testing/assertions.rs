//! Assertion functions for collected pipeline output.

use crate::value::Value;
use crate::window::{Item, ItemType, Window};
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two collections are equal in order and content.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
///
/// ```
/// use windflow::testing::assert_collections_equal;
///
/// assert_collections_equal(&[1, 2, 3], &[1, 2, 3]);
/// ```
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Collection mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}\n  Full expected: {expected:?}\n  Full actual: {actual:?}"
        );
    }
}

/// Assert that two collections contain the same elements, ignoring order.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
pub fn assert_collections_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );

    let actual_set: HashSet<_> = actual.iter().collect();
    let expected_set: HashSet<_> = expected.iter().collect();
    if actual_set != expected_set {
        let missing: Vec<_> = expected_set.difference(&actual_set).collect();
        let extra: Vec<_> = actual_set.difference(&expected_set).collect();
        panic!("Collection content mismatch:\n  Missing elements: {missing:?}\n  Extra elements: {extra:?}");
    }
}

/// Assert the payloads of `items`, in order.
///
/// ```
/// use windflow::testing::assert_items_data_equal;
/// use windflow::{Item, Value};
///
/// let items = vec![Item::new("a", 1), Item::new("b", 2)];
/// assert_items_data_equal(&items, &[Value::from(1), Value::from(2)]);
/// ```
pub fn assert_items_data_equal(items: &[Item], expected: &[Value]) {
    let data: Vec<Value> = items.iter().map(|i| i.data.clone()).collect();
    assert_collections_equal(&data, expected);
}

/// Assert the windows of `items`, in order.
pub fn assert_items_windows_equal(items: &[Item], expected: &[Window]) {
    let windows: Vec<Option<Window>> = items.iter().map(|i| i.window).collect();
    let expected: Vec<Option<Window>> = expected.iter().copied().map(Some).collect();
    assert_collections_equal(&windows, &expected);
}

/// Assert the [`ItemType`] of `items`, in order.
pub fn assert_items_kinds_equal(items: &[Item], expected: &[ItemType]) {
    let kinds: Vec<ItemType> = items.iter().map(|i| i.kind).collect();
    assert_collections_equal(&kinds, expected);
}

/// Assert that every element satisfies `pred`.
///
/// # Panics
///
/// Panics with the first offending element.
pub fn assert_all<T: Debug>(items: &[T], pred: impl Fn(&T) -> bool) {
    if let Some((i, bad)) = items.iter().enumerate().find(|(_, x)| !pred(x)) {
        panic!("Element at index {i} does not satisfy predicate: {bad:?}");
    }
}
