use std::collections::HashSet;

use crate::kv::keys::KeyTuple;

/// Keys of `expected` that never show up in `encountered`, sorted.
pub fn missing_keys<'a, I>(expected: I, encountered: &HashSet<KeyTuple>) -> Vec<KeyTuple>
where
    I: IntoIterator<Item = &'a KeyTuple>,
{
    let mut missing: Vec<KeyTuple> = expected
        .into_iter()
        .filter(|keys| !encountered.contains(*keys))
        .cloned()
        .collect();
    missing.sort_unstable();
    missing.dedup();
    missing
}
