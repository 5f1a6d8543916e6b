//! Fallback chain construction.
//!
//! Two phases: the persisted user ordering is merged with the available
//! model set into a candidate order, then a live health predicate picks the
//! first healthy candidate. User preference is never mutated by health.

use std::collections::HashSet;

/// Merge a user-ordered preference list with the available models.
///
/// Result: user models that are still available, in user order, followed by
/// the remaining available models in their default order. Every available
/// model appears exactly once; unknown or duplicate user entries are
/// dropped.
pub fn build_candidate_order(user_order: &[String], available: &[String]) -> Vec<String> {
    let available_set: HashSet<&str> = available.iter().map(String::as_str).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(available.len());
    let mut order = Vec::with_capacity(available.len());

    for id in user_order {
        if available_set.contains(id.as_str()) && seen.insert(id.as_str()) {
            order.push(id.clone());
        }
    }
    for id in available {
        if seen.insert(id.as_str()) {
            order.push(id.clone());
        }
    }
    order
}

/// Pick the first healthy candidate, or the first candidate when none is
/// healthy. Returns `None` only for an empty candidate list.
pub fn select_model<'a, F>(candidates: &'a [String], mut is_healthy: F) -> Option<&'a str>
where
    F: FnMut(&str) -> bool,
{
    candidates
        .iter()
        .find(|id| is_healthy(id.as_str()))
        .or_else(|| candidates.first())
        .map(String::as_str)
}
