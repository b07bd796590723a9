use std::collections::BTreeSet;

use crate::domain::MeterId;

/// Canonical comparison key for a raw identifier: trimmed and upper-cased.
/// Blank input yields `None`.
pub fn normalize(raw: &str) -> Option<MeterId> {
    let key = raw.trim().to_uppercase();
    if key.is_empty() {
        None
    } else {
        Some(MeterId::from_normalized(key))
    }
}

/// Normalize a batch of raw identifiers, returning the distinct keys and the
/// number of blank inputs that were dropped.
pub fn normalize_all<'a, I>(raw: I) -> (BTreeSet<MeterId>, usize)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ids = BTreeSet::new();
    let mut invalid = 0;
    for r in raw {
        match normalize(r) {
            Some(id) => {
                ids.insert(id);
            }
            None => invalid += 1,
        }
    }
    (ids, invalid)
}
