use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::{Amount, PathError, PropertyPath};

/// A node of the client-side game state tree.
///
/// Built from server JSON exactly once. Numbers and decimal strings become
/// [`Amount`]s at that point, so downstream code never re-parses chip
/// amounts. Maps are ordered so that iteration and hashing are
/// deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StateValue {
    #[default]
    Null,
    Bool(bool),
    Amount(Amount),
    Text(String),
    List(Vec<StateValue>),
    Map(BTreeMap<String, StateValue>),
}

impl StateValue {
    pub fn empty_map() -> Self {
        StateValue::Map(BTreeMap::new())
    }

    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => StateValue::Null,
            JsonValue::Bool(flag) => StateValue::Bool(*flag),
            JsonValue::Number(number) => number
                .as_i64()
                .and_then(Amount::checked_from_i64)
                .or_else(|| number.as_f64().and_then(Amount::from_f64))
                .map(StateValue::Amount)
                .unwrap_or_else(|| StateValue::Text(number.to_string())),
            JsonValue::String(text) => match reads_as_amount(text)
                .then(|| text.parse::<Amount>().ok())
                .flatten()
            {
                Some(amount) => StateValue::Amount(amount),
                None => StateValue::Text(text.clone()),
            },
            JsonValue::Array(items) => StateValue::List(items.iter().map(Self::from_json).collect()),
            JsonValue::Object(entries) => StateValue::Map(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), Self::from_json(value)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            StateValue::Null => JsonValue::Null,
            StateValue::Bool(flag) => JsonValue::Bool(*flag),
            StateValue::Amount(amount) if amount.is_whole() => JsonValue::from(amount.whole()),
            StateValue::Amount(amount) => serde_json::Number::from_f64(amount.to_f64())
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(amount.to_string())),
            StateValue::Text(text) => JsonValue::String(text.clone()),
            StateValue::List(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            StateValue::Map(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn as_amount(&self) -> Option<Amount> {
        match self {
            StateValue::Amount(amount) => Some(*amount),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, StateValue>> {
        match self {
            StateValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn get(&self, path: &PropertyPath) -> Option<&StateValue> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    pub fn get_mut(&mut self, path: &PropertyPath) -> Option<&mut StateValue> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| node.child_mut(segment))
    }

    /// Writes `value` at `path`. The parent must already exist; list parents
    /// accept an existing index or exactly one past the end.
    pub fn set(&mut self, path: &PropertyPath, value: StateValue) -> Result<(), PathError> {
        let Some(parent_path) = path.parent() else {
            *self = value;
            return Ok(());
        };
        let Some(key) = path.last() else {
            return Err(PathError::Unresolved(path.clone()));
        };
        let parent = self
            .get_mut(&parent_path)
            .ok_or_else(|| PathError::Unresolved(path.clone()))?;
        match parent {
            StateValue::Map(entries) => {
                entries.insert(key.to_string(), value);
                Ok(())
            }
            StateValue::List(items) => {
                let index = parse_index(key).ok_or_else(|| PathError::Unresolved(path.clone()))?;
                if index < items.len() {
                    items[index] = value;
                    Ok(())
                } else if index == items.len() {
                    items.push(value);
                    Ok(())
                } else {
                    Err(PathError::IndexOutOfRange(path.clone()))
                }
            }
            _ => Err(PathError::NotAContainer(path.clone())),
        }
    }

    /// Removes the value at `path`, returning it. Missing leaves are not an
    /// error; a missing parent is.
    pub fn remove(&mut self, path: &PropertyPath) -> Result<Option<StateValue>, PathError> {
        let Some(parent_path) = path.parent() else {
            return Err(PathError::RootRemoval);
        };
        let Some(key) = path.last() else {
            return Err(PathError::RootRemoval);
        };
        let parent = self
            .get_mut(&parent_path)
            .ok_or_else(|| PathError::Unresolved(path.clone()))?;
        match parent {
            StateValue::Map(entries) => Ok(entries.remove(key)),
            StateValue::List(items) => {
                let index = parse_index(key).ok_or_else(|| PathError::Unresolved(path.clone()))?;
                if index < items.len() {
                    Ok(Some(items.remove(index)))
                } else {
                    Ok(None)
                }
            }
            _ => Err(PathError::NotAContainer(path.clone())),
        }
    }

    /// Writes `Some(value)` or removes on `None`.
    pub fn put(&mut self, path: &PropertyPath, value: Option<StateValue>) -> Result<(), PathError> {
        match value {
            Some(value) => self.set(path, value),
            None => self.remove(path).map(|_| ()),
        }
    }

    /// Recursively merges `patch` into `self`: maps merge key by key, any
    /// other value replaces what was there.
    pub fn merge(&mut self, patch: StateValue) {
        match (self, patch) {
            (StateValue::Map(entries), StateValue::Map(patch_entries)) => {
                for (key, value) in patch_entries {
                    match entries.get_mut(&key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            entries.insert(key, value);
                        }
                    }
                }
            }
            (slot, value) => *slot = value,
        }
    }

    fn child(&self, segment: &str) -> Option<&StateValue> {
        match self {
            StateValue::Map(entries) => entries.get(segment),
            StateValue::List(items) => parse_index(segment).and_then(|index| items.get(index)),
            _ => None,
        }
    }

    fn child_mut(&mut self, segment: &str) -> Option<&mut StateValue> {
        match self {
            StateValue::Map(entries) => entries.get_mut(segment),
            StateValue::List(items) => {
                parse_index(segment).and_then(move |index| items.get_mut(index))
            }
            _ => None,
        }
    }
}

/// Decimal strings become amounts unless they read like identifiers: an
/// explicit `+` or a zero-padded whole part (`"007"`) stays text, so it
/// renders back unchanged.
fn reads_as_amount(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let whole = unsigned.split('.').next().unwrap_or_default();
    !unsigned.starts_with('+') && !(whole.len() > 1 && whole.starts_with('0'))
}

fn parse_index(segment: &str) -> Option<usize> {
    if segment.len() > 1 && segment.starts_with('0') {
        return None;
    }
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

impl From<Amount> for StateValue {
    fn from(amount: Amount) -> Self {
        StateValue::Amount(amount)
    }
}

impl From<&str> for StateValue {
    fn from(text: &str) -> Self {
        StateValue::Text(text.to_string())
    }
}

impl From<bool> for StateValue {
    fn from(flag: bool) -> Self {
        StateValue::Bool(flag)
    }
}

impl From<JsonValue> for StateValue {
    fn from(value: JsonValue) -> Self {
        StateValue::from_json(&value)
    }
}

impl Serialize for StateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StateValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Ok(StateValue::from_json(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> StateValue {
        StateValue::from_json(&json!({
            "players": {
                "7": { "name": "ana", "stack": "1000.00", "cards": ["Ah", "Kd"] }
            },
            "pots": [ 40 ]
        }))
    }

    #[test]
    fn ingestion_converts_amounts_once() {
        let state = table();
        let stack = state.get(&PropertyPath::parse("/players/7/stack"));
        assert_eq!(stack, Some(&StateValue::Amount(Amount::from_i64(1000))));
        let name = state.get(&PropertyPath::parse("/players/7/name"));
        assert_eq!(name, Some(&StateValue::from("ana")));
        let pot = state.get(&PropertyPath::parse("/pots/0"));
        assert_eq!(pot.and_then(StateValue::as_amount), Some(Amount::from_i64(40)));
    }

    #[test]
    fn json_round_trip_normalises_amounts() {
        let state = table();
        let rendered = state.to_json();
        assert_eq!(rendered["players"]["7"]["stack"], json!(1000));
        assert_eq!(StateValue::from_json(&rendered), state);
        let half = StateValue::Amount(Amount(2_500_000));
        assert_eq!(half.to_json(), json!(2.5));
    }

    #[test]
    fn zero_padded_strings_stay_text() {
        let seat = StateValue::from_json(&json!({ "id": "007", "tag": "+5", "ante": "0.50" }));
        assert_eq!(seat.get(&PropertyPath::parse("/id")), Some(&StateValue::from("007")));
        assert_eq!(seat.get(&PropertyPath::parse("/tag")), Some(&StateValue::from("+5")));
        assert_eq!(
            seat.get(&PropertyPath::parse("/ante")),
            Some(&StateValue::Amount(Amount(500_000)))
        );
        assert_eq!(seat.to_json()["id"], json!("007"));
    }

    #[test]
    fn set_requires_existing_parent() {
        let mut state = table();
        state
            .set(&PropertyPath::parse("/players/7/stack"), Amount::from_i64(5).into())
            .unwrap();
        assert_eq!(
            state.get(&PropertyPath::parse("/players/7/stack")),
            Some(&StateValue::Amount(Amount::from_i64(5)))
        );
        let missing = PropertyPath::parse("/players/9/stack");
        assert_eq!(
            state.set(&missing, StateValue::Null),
            Err(PathError::Unresolved(missing))
        );
        let scalar_parent = PropertyPath::parse("/players/7/name/first");
        assert_eq!(
            state.set(&scalar_parent, StateValue::Null),
            Err(PathError::NotAContainer(scalar_parent))
        );
    }

    #[test]
    fn list_writes_append_at_end_only() {
        let mut state = table();
        state.set(&PropertyPath::parse("/pots/1"), Amount::from_i64(8).into()).unwrap();
        assert_eq!(state.get(&PropertyPath::parse("/pots")).map(|p| match p {
            StateValue::List(items) => items.len(),
            _ => 0,
        }), Some(2));
        let gap = PropertyPath::parse("/pots/5");
        assert_eq!(
            state.set(&gap, StateValue::Null),
            Err(PathError::IndexOutOfRange(gap))
        );
        assert!(state.get(&PropertyPath::parse("/pots/01")).is_none());
    }

    #[test]
    fn remove_and_put() {
        let mut state = table();
        let removed = state.remove(&PropertyPath::parse("/players/7/cards/1")).unwrap();
        assert_eq!(removed, Some(StateValue::from("Kd")));
        assert_eq!(state.remove(&PropertyPath::root()), Err(PathError::RootRemoval));
        state.put(&PropertyPath::parse("/players/7"), None).unwrap();
        assert!(state.get(&PropertyPath::parse("/players/7")).is_none());
    }

    #[test]
    fn merge_is_recursive_for_maps() {
        let mut state = table();
        state.merge(StateValue::from_json(&json!({
            "players": { "7": { "stack": 900 }, "8": { "stack": 50 } },
            "pots": []
        })));
        assert_eq!(
            state.get(&PropertyPath::parse("/players/7/name")),
            Some(&StateValue::from("ana"))
        );
        assert_eq!(
            state.get(&PropertyPath::parse("/players/7/stack")),
            Some(&StateValue::Amount(Amount::from_i64(900)))
        );
        assert!(state.get(&PropertyPath::parse("/players/8")).is_some());
        assert_eq!(
            state.get(&PropertyPath::parse("/pots")),
            Some(&StateValue::List(Vec::new()))
        );
    }
}
