use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use table_schema::{digest_optional, PathError, PropertyPath, StateValue};

use crate::animation::{AnimationQueue, AnimationRecord};
use crate::clock::LogicalTime;

/// The tree the presentation layer draws at one logical time.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedState {
    time: LogicalTime,
    root: Option<StateValue>,
    skipped: Vec<PathError>,
}

impl RenderedState {
    pub fn empty(time: LogicalTime) -> Self {
        Self {
            time,
            root: None,
            skipped: Vec::new(),
        }
    }

    pub fn time(&self) -> LogicalTime {
        self.time
    }

    /// `None` until a state has been loaded.
    pub fn root(&self) -> Option<&StateValue> {
        self.root.as_ref()
    }

    pub fn into_root(self) -> Option<StateValue> {
        self.root
    }

    pub fn get(&self, path: &PropertyPath) -> Option<&StateValue> {
        self.root.as_ref()?.get(path)
    }

    /// Paths whose records could not be applied this frame.
    pub fn skipped(&self) -> &[PathError] {
        &self.skipped
    }

    pub fn digest(&self) -> u64 {
        digest_optional(self.root.as_ref())
    }

    pub fn to_json(&self) -> JsonValue {
        self.root
            .as_ref()
            .map_or(JsonValue::Null, StateValue::to_json)
    }
}

/// Renders every record in `queue` at `time`.
///
/// Pure: the same queue and time always give the same tree.
pub fn sample(queue: &AnimationQueue, time: LogicalTime) -> RenderedState {
    let rendered = sample_records(queue.records(), time);
    if !rendered.skipped.is_empty() {
        tracing::debug!(
            target: "table::sampler",
            time,
            skipped = rendered.skipped.len(),
            "sampler.paths_skipped"
        );
    }
    rendered
}

/// Rendered value of one path, using only the records on that path, its
/// ancestors and its descendants.
pub fn sample_path(
    queue: &AnimationQueue,
    path: &PropertyPath,
    time: LogicalTime,
) -> Option<StateValue> {
    let relevant = queue
        .records()
        .iter()
        .filter(|record| path.starts_with(&record.path) || record.path.starts_with(path));
    sample_records(relevant, time).get(path).cloned()
}

fn sample_records<'a>(
    records: impl IntoIterator<Item = &'a AnimationRecord>,
    time: LogicalTime,
) -> RenderedState {
    let mut effective: BTreeMap<&PropertyPath, &AnimationRecord> = BTreeMap::new();
    for record in records {
        match effective.entry(&record.path) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                if record.outranks_at(slot.get(), time) {
                    slot.insert(record);
                }
            }
        }
    }

    let mut rendered = RenderedState::empty(time);
    let mut removals = Vec::new();
    for (path, record) in &effective {
        let shadowed = path.ancestors().any(|ancestor| {
            effective
                .get(&ancestor)
                .is_some_and(|holder| holder.outranks_at(record, time))
        });
        if shadowed {
            continue;
        }

        let value = record.value_at(time);
        if path.is_root() {
            rendered.root = value;
            continue;
        }
        match value {
            Some(value) => {
                let Some(tree) = rendered.root.as_mut() else {
                    rendered.skipped.push(PathError::Unresolved((*path).clone()));
                    continue;
                };
                if let Err(err) = tree.set(path, value) {
                    rendered.skipped.push(err);
                }
            }
            None => removals.push(*path),
        }
    }

    // Deepest and highest list index first, so earlier removals never shift
    // the indices of later ones.
    for path in removals.into_iter().rev() {
        let Some(tree) = rendered.root.as_mut() else {
            break;
        };
        if let Err(err) = tree.remove(path) {
            rendered.skipped.push(err);
        }
    }
    rendered
}
