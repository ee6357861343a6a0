//! State change detection.

use crate::trace::{ChangeType, StateChange};
use nodetape_codec::State;
use nodetape_core::Timestamp;
use std::collections::BTreeSet;

/// Diff two snapshots over the union of their field names
///
/// One change per added, removed, or modified field, in field-name order.
#[must_use]
pub fn detect_changes(before: &State, after: &State, at: Timestamp) -> Vec<StateChange> {
    let fields: BTreeSet<&String> = before.keys().chain(after.keys()).collect();

    fields
        .into_iter()
        .filter_map(|field| {
            let old = before.get(field);
            let new = after.get(field);
            let change_type = match (old, new) {
                (None, Some(_)) => ChangeType::Added,
                (Some(_), None) => ChangeType::Removed,
                (Some(a), Some(b)) if a != b => ChangeType::Modified,
                _ => return None,
            };
            Some(StateChange {
                timestamp: at,
                field: field.clone(),
                old_value: old.cloned(),
                new_value: new.cloned(),
                change_type,
            })
        })
        .collect()
}

/// Apply a node's partial update to a copy of its input state
///
/// Map outputs are merged field by field; any other output is ignored.
#[must_use]
pub fn merge_update(state: &State, update: &nodetape_codec::Value) -> State {
    let mut merged = state.clone();
    if let Some(fields) = update.as_map() {
        for (field, value) in fields {
            merged.insert(field.clone(), value.clone());
        }
    }
    merged
}
