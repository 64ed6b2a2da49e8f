//! Per-field reducers used when merging a node's delta into graph state.
//!
//! Three strategies cover every field of the conversation state:
//!
//! - [`append_by_key`]: append-only accumulation with key-based dedup
//!   (messages keyed by id). Associative and idempotent, so re-applying a
//!   delta after an interrupt resume cannot duplicate entries.
//! - [`replace`]: last-writer-wins for scalars.
//! - [`monotonic_max`]: last-writer-wins that never regresses (counters).

use std::hash::Hash;

/// Appends each update whose key is not already present, preserving order.
///
/// The key function must be stable per item (e.g. a message id). Updates whose
/// key already exists in `current` are skipped.
pub fn append_by_key<T, K, F>(current: &mut Vec<T>, updates: Vec<T>, key: F)
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut existing: std::collections::HashSet<K> = current.iter().map(&key).collect();
    for update in updates {
        if existing.insert(key(&update)) {
            current.push(update);
        }
    }
}

/// Replaces `current` when the delta carries a value.
pub fn replace<T>(current: &mut T, update: Option<T>) {
    if let Some(v) = update {
        *current = v;
    }
}

/// Replaces `current` only when the delta's value is larger. Counters merged
/// this way are monotonically non-decreasing within one graph execution.
pub fn monotonic_max<T: Ord + Copy>(current: &mut T, update: Option<T>) {
    if let Some(v) = update {
        if v > *current {
            *current = v;
        }
    }
}
