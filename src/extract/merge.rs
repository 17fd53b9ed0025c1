//! Set arithmetic for combining reads from different sources

use std::collections::BTreeSet;

use crate::identifier::Identifier;

/// Union every source into one set, dropping `exclude` when given.
///
/// Pure and idempotent: merging a set with itself, or merging the result again
/// with any of its sources, yields the same set.
pub fn merge_sets<'a, I>(sources: I, exclude: Option<&Identifier>) -> BTreeSet<Identifier>
where
    I: IntoIterator<Item = &'a BTreeSet<Identifier>>,
{
    let mut merged: BTreeSet<Identifier> = sources.into_iter().flatten().cloned().collect();
    if let Some(subject) = exclude {
        merged.remove(subject);
    }
    merged
}

/// `found / expected`, or 1.0 when the expected total is unknown (0).
///
/// Not capped: a stale expected total can yield values above 1.0.
pub fn completeness(found: usize, expected: u64) -> f64 {
    if expected == 0 {
        1.0
    } else {
        found as f64 / expected as f64
    }
}
