use crate::types::Event;
use std::collections::HashSet;

/// Keeps the first event seen for each id, preserving input order.
///
/// A batch upsert must never see the same conflict key twice, so this runs on
/// every batch before it reaches the store. Returns the survivors and the
/// number of events dropped.
pub fn dedupe_by_id(events: Vec<Event>) -> (Vec<Event>, usize) {
    let total = events.len();
    let mut seen = HashSet::with_capacity(total);
    let unique: Vec<Event> = events
        .into_iter()
        .filter(|event| seen.insert(event.id.clone()))
        .collect();
    let collapsed = total - unique.len();
    (unique, collapsed)
}
