//! Key-based joins over row slices.
//!
//! Inner joins keep the order of the left side; every left row is paired
//! with all matching right rows in right order, so duplicate keys on the
//! right multiply left rows.

use std::collections::HashMap;

/// Index rows by key, keeping every row per key in input order.
pub fn index_by<'a, R>(
    rows: &'a [R],
    key: impl Fn(&'a R) -> &'a str,
) -> HashMap<&'a str, Vec<&'a R>> {
    let mut index: HashMap<&str, Vec<&R>> = HashMap::new();
    for row in rows {
        index.entry(key(row)).or_default().push(row);
    }
    index
}

/// Inner join `left` against an index built with [`index_by`].
pub fn inner_join<'a, L, R, T>(
    left: impl IntoIterator<Item = L>,
    right: &HashMap<&str, Vec<&'a R>>,
    left_key: impl Fn(&L) -> &str,
    combine: impl Fn(&L, &'a R) -> T,
) -> Vec<T> {
    let mut joined = Vec::new();
    for l in left {
        if let Some(matches) = right.get(left_key(&l)) {
            joined.extend(matches.iter().map(|&r| combine(&l, r)));
        }
    }
    joined
}
