use table_schema::{PropertyPath, StateValue};
use thiserror::Error;

/// How an accepted message rewrites the authoritative state.
#[derive(Debug, Clone, PartialEq)]
pub enum StatePatch {
    /// Full snapshot; replaces the state wholesale.
    Replace(StateValue),
    /// Partial snapshot; deep-merged into the current state.
    Merge(StateValue),
    /// Replaces one subtree, creating it under the root if needed.
    ReplaceAt(PropertyPath, StateValue),
    /// Tournament state; replaces the `/tournament` subtree and is
    /// version-checked against the tournament stream only.
    Tournament(StateValue),
}

/// Root key owned by the tournament stream.
pub const TOURNAMENT_KEY: &str = "tournament";

/// Result of an accepted store application.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedUpdate {
    pub previous: StateValue,
    pub version: Option<i64>,
    /// First state ever loaded into this store.
    pub initial: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("stale version {incoming} (applied {applied})")]
    StaleVersion { incoming: i64, applied: i64 },
}

/// Holds the single authoritative game state and its applied versions.
///
/// Gamestate and tournament messages are versioned independently. Each
/// version never decreases; messages carrying a version at or below their
/// stream's are dropped, messages without a version are applied and leave
/// it untouched. Full gamestate snapshots never carry the tournament
/// subtree, so a `Replace` keeps the current one.
#[derive(Debug, Clone, Default)]
pub struct GameStateStore {
    state: StateValue,
    applied_version: Option<i64>,
    tournament_version: Option<i64>,
    loaded: bool,
    accepted: u64,
    dropped: u64,
}

impl GameStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &StateValue {
        &self.state
    }

    pub fn version(&self) -> Option<i64> {
        self.applied_version
    }

    pub fn tournament_version(&self) -> Option<i64> {
        self.tournament_version
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn apply(
        &mut self,
        version: Option<i64>,
        patch: StatePatch,
    ) -> Result<AcceptedUpdate, StoreError> {
        let tournament = matches!(patch, StatePatch::Tournament(_));
        let stream = if tournament { "tournament" } else { "gamestate" };
        let current = if tournament {
            self.tournament_version
        } else {
            self.applied_version
        };
        if let (Some(incoming), Some(applied)) = (version, current) {
            if incoming <= applied {
                self.dropped += 1;
                tracing::debug!(
                    target: "table::store",
                    stream,
                    incoming,
                    applied,
                    "store.dropped=stale"
                );
                return Err(StoreError::StaleVersion { incoming, applied });
            }
        }

        let previous = match patch {
            StatePatch::Replace(mut state) => {
                self.carry_tournament(&mut state);
                std::mem::replace(&mut self.state, state)
            }
            StatePatch::Merge(partial) => {
                let previous = self.state.clone();
                self.ensure_map_root();
                self.state.merge(partial);
                previous
            }
            StatePatch::ReplaceAt(path, subtree) => {
                let previous = self.state.clone();
                self.ensure_map_root();
                self.replace_subtree(&path, subtree);
                previous
            }
            StatePatch::Tournament(subtree) => {
                let previous = self.state.clone();
                self.ensure_map_root();
                self.replace_subtree(&PropertyPath::new([TOURNAMENT_KEY]), subtree);
                previous
            }
        };

        let initial = !self.loaded;
        self.loaded = true;
        let slot = if tournament {
            &mut self.tournament_version
        } else {
            &mut self.applied_version
        };
        if version.is_some() {
            *slot = version;
        }
        let version = *slot;
        self.accepted += 1;
        tracing::trace!(
            target: "table::store",
            stream,
            version = ?version,
            initial,
            "store.accepted"
        );
        Ok(AcceptedUpdate {
            previous,
            version,
            initial,
        })
    }

    /// Forgets everything, including the applied version. Only replay uses
    /// this.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn carry_tournament(&self, incoming: &mut StateValue) {
        let (Some(current), StateValue::Map(entries)) = (
            self.state.as_map().and_then(|map| map.get(TOURNAMENT_KEY)),
            incoming,
        ) else {
            return;
        };
        entries
            .entry(TOURNAMENT_KEY.to_string())
            .or_insert_with(|| current.clone());
    }

    fn ensure_map_root(&mut self) {
        if !matches!(self.state, StateValue::Map(_)) {
            self.state = StateValue::empty_map();
        }
    }

    fn replace_subtree(&mut self, path: &PropertyPath, subtree: StateValue) {
        let mut cursor = PropertyPath::root();
        for segment in path.segments().iter().take(path.len().saturating_sub(1)) {
            cursor = cursor.child(segment.as_str());
            if self.state.get(&cursor).is_none() {
                let _ = self.state.set(&cursor, StateValue::empty_map());
            }
        }
        if let Err(err) = self.state.set(path, subtree) {
            tracing::debug!(
                target: "table::store",
                path = %path,
                error = %err,
                "store.subtree_skipped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(value: serde_json::Value) -> StateValue {
        StateValue::from_json(&value)
    }

    #[test]
    fn first_load_is_initial_and_returns_empty_previous() {
        let mut store = GameStateStore::new();
        let accepted = store
            .apply(Some(-1), StatePatch::Replace(state(json!({ "players": {} }))))
            .unwrap();
        assert!(accepted.initial);
        assert_eq!(accepted.previous, StateValue::Null);
        assert_eq!(store.version(), Some(-1));
    }

    #[test]
    fn stale_and_duplicate_versions_are_dropped() {
        let mut store = GameStateStore::new();
        store
            .apply(Some(2), StatePatch::Replace(state(json!({ "v": 2 }))))
            .unwrap();
        assert_eq!(
            store.apply(Some(1), StatePatch::Replace(state(json!({ "v": 1 })))),
            Err(StoreError::StaleVersion {
                incoming: 1,
                applied: 2
            })
        );
        assert!(store
            .apply(Some(2), StatePatch::Replace(state(json!({ "v": 99 }))))
            .is_err());
        assert_eq!(store.version(), Some(2));
        assert_eq!(store.state(), &state(json!({ "v": 2 })));
        assert_eq!(store.dropped(), 2);
        assert_eq!(store.accepted(), 1);
    }

    #[test]
    fn accepted_update_returns_previous_state() {
        let mut store = GameStateStore::new();
        store
            .apply(Some(0), StatePatch::Replace(state(json!({ "pot": 10 }))))
            .unwrap();
        let accepted = store
            .apply(Some(1), StatePatch::Replace(state(json!({ "pot": 20 }))))
            .unwrap();
        assert!(!accepted.initial);
        assert_eq!(accepted.previous, state(json!({ "pot": 10 })));
        assert_eq!(accepted.version, Some(1));
    }

    #[test]
    fn unversioned_updates_keep_the_version() {
        let mut store = GameStateStore::new();
        store
            .apply(Some(5), StatePatch::Replace(state(json!({ "a": 1 }))))
            .unwrap();
        store
            .apply(None, StatePatch::Merge(state(json!({ "b": 2 }))))
            .unwrap();
        assert_eq!(store.version(), Some(5));
        assert_eq!(store.state(), &state(json!({ "a": 1, "b": 2 })));
    }

    #[test]
    fn full_snapshots_keep_the_tournament_subtree() {
        let mut store = GameStateStore::new();
        store
            .apply(Some(0), StatePatch::Replace(state(json!({ "pot": 10 }))))
            .unwrap();
        store
            .apply(None, StatePatch::Tournament(state(json!({ "level": 3 }))))
            .unwrap();
        store
            .apply(Some(1), StatePatch::Replace(state(json!({ "pot": 20 }))))
            .unwrap();
        assert_eq!(
            store.state(),
            &state(json!({ "pot": 20, "tournament": { "level": 3 } }))
        );
    }

    #[test]
    fn tournament_versions_do_not_gate_gamestate() {
        let mut store = GameStateStore::new();
        store
            .apply(Some(0), StatePatch::Replace(state(json!({ "pot": 10 }))))
            .unwrap();
        let accepted = store
            .apply(Some(5), StatePatch::Tournament(state(json!({ "level": 1 }))))
            .unwrap();
        assert_eq!(accepted.version, Some(5));
        assert_eq!(store.tournament_version(), Some(5));
        assert_eq!(store.version(), Some(0));

        assert!(store
            .apply(Some(3), StatePatch::Replace(state(json!({ "pot": 30 }))))
            .is_ok());
        assert_eq!(
            store.apply(Some(4), StatePatch::Tournament(state(json!({ "level": 0 })))),
            Err(StoreError::StaleVersion {
                incoming: 4,
                applied: 5
            })
        );
        assert_eq!(
            store.state(),
            &state(json!({ "pot": 30, "tournament": { "level": 1 } }))
        );
    }

    #[test]
    fn replace_at_builds_missing_parents() {
        let mut store = GameStateStore::new();
        store
            .apply(
                Some(0),
                StatePatch::ReplaceAt(
                    PropertyPath::parse("/tournament/level"),
                    state(json!({ "blinds": "50/100" })),
                ),
            )
            .unwrap();
        assert_eq!(
            store.state(),
            &state(json!({ "tournament": { "level": { "blinds": "50/100" } } }))
        );
    }
}
