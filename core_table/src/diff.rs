use table_schema::{PathError, PropertyPath, StateValue};

/// One difference between two state trees.
///
/// `None` on either side is the absent marker: the path did not exist in
/// that tree. It is distinct from `Some(StateValue::Null)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathChange {
    pub path: PropertyPath,
    pub old_value: Option<StateValue>,
    pub new_value: Option<StateValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

impl PathChange {
    pub fn added(path: PropertyPath, value: StateValue) -> Self {
        Self {
            path,
            old_value: None,
            new_value: Some(value),
        }
    }

    pub fn removed(path: PropertyPath, value: StateValue) -> Self {
        Self {
            path,
            old_value: Some(value),
            new_value: None,
        }
    }

    pub fn changed(path: PropertyPath, old_value: StateValue, new_value: StateValue) -> Self {
        Self {
            path,
            old_value: Some(old_value),
            new_value: Some(new_value),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match (&self.old_value, &self.new_value) {
            (None, _) => ChangeKind::Added,
            (_, None) => ChangeKind::Removed,
            _ => ChangeKind::Changed,
        }
    }

    /// Both sides are amounts, so the change can be tweened.
    pub fn is_numeric(&self) -> bool {
        matches!(
            (&self.old_value, &self.new_value),
            (Some(StateValue::Amount(_)), Some(StateValue::Amount(_)))
        )
    }
}

/// Structural delta from `old` to `new`.
///
/// Equal subtrees produce nothing. Maps report removed and changed keys in
/// key order, then added keys. Lists compare shared indices, then report
/// appended indices ascending and truncated indices descending, so the
/// output can be replayed in order by [`apply_changes`]. A value whose type
/// changes is reported once at its own path.
pub fn diff(old: &StateValue, new: &StateValue) -> Vec<PathChange> {
    let mut changes = Vec::new();
    diff_at(&PropertyPath::root(), old, new, &mut changes);
    changes
}

fn diff_at(path: &PropertyPath, old: &StateValue, new: &StateValue, out: &mut Vec<PathChange>) {
    if old == new {
        return;
    }
    match (old, new) {
        (StateValue::Map(before), StateValue::Map(after)) => {
            for (key, old_child) in before {
                let child_path = path.child(key.as_str());
                match after.get(key) {
                    Some(new_child) => diff_at(&child_path, old_child, new_child, out),
                    None => out.push(PathChange::removed(child_path, old_child.clone())),
                }
            }
            for (key, new_child) in after {
                if !before.contains_key(key) {
                    out.push(PathChange::added(path.child(key.as_str()), new_child.clone()));
                }
            }
        }
        (StateValue::List(before), StateValue::List(after)) => {
            let shared = before.len().min(after.len());
            for index in 0..shared {
                diff_at(&path.child(index.to_string()), &before[index], &after[index], out);
            }
            for (index, new_child) in after.iter().enumerate().skip(shared) {
                out.push(PathChange::added(path.child(index.to_string()), new_child.clone()));
            }
            for index in (shared..before.len()).rev() {
                out.push(PathChange::removed(
                    path.child(index.to_string()),
                    before[index].clone(),
                ));
            }
        }
        _ => out.push(PathChange::changed(path.clone(), old.clone(), new.clone())),
    }
}

/// Replays `changes` onto `target` in order.
///
/// A change whose path no longer resolves is skipped and reported; it never
/// stops the remaining changes from applying.
pub fn apply_changes(target: &mut StateValue, changes: &[PathChange]) -> Vec<PathError> {
    let mut skipped = Vec::new();
    for change in changes {
        if let Err(err) = target.put(&change.path, change.new_value.clone()) {
            tracing::debug!(
                target: "table::diff",
                path = %change.path,
                error = %err,
                "diff.change_skipped"
            );
            skipped.push(err);
        }
    }
    skipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use table_schema::Amount;

    fn state(value: serde_json::Value) -> StateValue {
        StateValue::from_json(&value)
    }

    #[test]
    fn equal_trees_produce_nothing() {
        let a = state(json!({ "players": { "7": { "stack": "5.00" } } }));
        let b = state(json!({ "players": { "7": { "stack": 5 } } }));
        assert!(diff(&a, &b).is_empty());
    }

    #[test]
    fn reports_added_removed_and_changed() {
        let old = state(json!({
            "players": { "7": { "stack": 1000 }, "8": { "stack": 10 } },
            "board": []
        }));
        let new = state(json!({
            "players": { "7": { "stack": 1200 }, "9": { "stack": 300 } },
            "board": ["Ah"]
        }));
        let changes = diff(&old, &new);
        let summary: Vec<(String, ChangeKind)> = changes
            .iter()
            .map(|change| (change.path.to_string(), change.kind()))
            .collect();
        assert_eq!(
            summary,
            [
                ("/board/0".to_string(), ChangeKind::Added),
                ("/players/7/stack".to_string(), ChangeKind::Changed),
                ("/players/8".to_string(), ChangeKind::Removed),
                ("/players/9".to_string(), ChangeKind::Added),
            ]
        );
        let stack = &changes[1];
        assert!(stack.is_numeric());
        assert_eq!(
            stack.new_value,
            Some(StateValue::Amount(Amount::from_i64(1200)))
        );
    }

    #[test]
    fn null_is_not_absent() {
        let old = state(json!({ "timer": null }));
        let new = state(json!({}));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_value, Some(StateValue::Null));
        assert_eq!(changes[0].new_value, None);
        assert_eq!(changes[0].kind(), ChangeKind::Removed);
    }

    #[test]
    fn type_change_is_reported_at_its_own_path() {
        let old = state(json!({ "pots": [10, 20] }));
        let new = state(json!({ "pots": { "main": 30 } }));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, PropertyPath::parse("/pots"));
    }

    #[test]
    fn list_shrink_and_grow_recompose() {
        let long = state(json!({ "board": ["Ah", "Kd", "7c", "2s"] }));
        let short = state(json!({ "board": ["Ah", "Qd"] }));

        let mut target = long.clone();
        assert!(apply_changes(&mut target, &diff(&long, &short)).is_empty());
        assert_eq!(target, short);

        let mut target = short.clone();
        assert!(apply_changes(&mut target, &diff(&short, &long)).is_empty());
        assert_eq!(target, long);
    }

    #[test]
    fn root_scalar_change() {
        let changes = diff(&StateValue::Null, &state(json!({ "a": 1 })));
        assert_eq!(changes.len(), 1);
        assert!(changes[0].path.is_root());
        let mut target = StateValue::Null;
        assert!(apply_changes(&mut target, &changes).is_empty());
        assert_eq!(target, state(json!({ "a": 1 })));
    }

    #[test]
    fn unresolvable_changes_are_skipped_not_fatal() {
        let mut target = state(json!({ "players": {} }));
        let changes = vec![
            PathChange::added(PropertyPath::parse("/players/7/stack"), StateValue::Null),
            PathChange::added(PropertyPath::parse("/players/8"), StateValue::empty_map()),
        ];
        let skipped = apply_changes(&mut target, &changes);
        assert_eq!(skipped.len(), 1);
        assert!(target.get(&PropertyPath::parse("/players/8")).is_some());
    }
}
