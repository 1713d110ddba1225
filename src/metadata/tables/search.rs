//! Binary search primitives for sorted tables.
//!
//! Several one-to-many relationships are not stored as lists but as a contiguous run of rows
//! in a table that is sorted by the owner column, e.g. all `CustomAttribute` rows of one parent.
//! The run is located with two searches over a projected key:
//!
//! - [`greatest_lower_bound`]: the last row whose key is smaller than the search key
//! - [`least_upper_bound`]: the first row whose key is greater than the search key
//!
//! Both only ever probe rows in `[0, count)` and handle empty tables. The row reader is a
//! fallible closure so that a disposed image or an unreadable row stops the search with an
//! error instead of producing a wrong range.

use std::ops::Range;

use crate::Result;

/// Number of leading rows in `[0, count)` for which `before(probe(row))` holds.
///
/// `before` must be true for a prefix of the rows and false for the rest.
fn partition<K>(count: u32, probe: impl Fn(u32) -> Result<K>, before: impl Fn(&K) -> bool) -> Result<u32> {
    let mut low = 0_u32;
    let mut high = count;

    while low < high {
        let mid = low + (high - low) / 2;
        if before(&probe(mid)?) {
            low = mid + 1;
        } else {
            high = mid;
        }
    }

    Ok(low)
}

/// Index of the last row whose projected key is smaller than `key`, `None` if there is none.
///
/// # Errors
/// Propagates any error of `probe`.
pub fn greatest_lower_bound<K: Ord>(
    count: u32,
    key: &K,
    probe: impl Fn(u32) -> Result<K>,
) -> Result<Option<u32>> {
    let smaller = partition(count, probe, |candidate| candidate < key)?;
    Ok(smaller.checked_sub(1))
}

/// Index of the first row whose projected key is greater than `key`, `count` if there is none.
///
/// # Errors
/// Propagates any error of `probe`.
pub fn least_upper_bound<K: Ord>(
    count: u32,
    key: &K,
    probe: impl Fn(u32) -> Result<K>,
) -> Result<u32> {
    partition(count, probe, |candidate| candidate <= key)
}

/// The rows whose projected key equals `key`, as a half-open range of row indexes.
///
/// # Errors
/// Propagates any error of `probe`.
pub fn equal_range<K: Ord>(
    count: u32,
    key: &K,
    probe: impl Fn(u32) -> Result<K>,
) -> Result<Range<u32>> {
    let start = match greatest_lower_bound(count, key, &probe)? {
        Some(index) => index + 1,
        None => 0,
    };
    let end = least_upper_bound(count, key, &probe)?;

    Ok(start..end.max(start))
}
