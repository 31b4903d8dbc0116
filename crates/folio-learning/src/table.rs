use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// An open key→value description of a learning state.
pub type StateMap = BTreeMap<String, serde_json::Value>;

/// Canonical serialization of a state map.
///
/// Keys are sorted at every nesting level, so two maps with equal contents
/// yield the same key regardless of how they were built.
pub fn state_key(state: &StateMap) -> String {
    let canonical: serde_json::Map<String, serde_json::Value> = state
        .iter()
        .map(|(k, v)| (k.clone(), canonicalize(v)))
        .collect();
    serde_json::Value::Object(canonical).to_string()
}

fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key.as_str()]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

/// One learned `(state, action)` estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueTableEntry {
    pub state: String,
    pub action: String,
    pub value: f64,
    pub visits: u64,
}

/// Value estimates grouped by state key. Actions keep first-seen order.
#[derive(Debug, Default)]
pub struct ValueTable {
    states: HashMap<String, Vec<ValueTableEntry>>,
}

impl ValueTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded value, 0 for an unseen pair.
    pub fn value(&self, state: &str, action: &str) -> f64 {
        self.get(state, action).map_or(0.0, |e| e.value)
    }

    pub fn get(&self, state: &str, action: &str) -> Option<&ValueTableEntry> {
        self.states
            .get(state)
            .and_then(|entries| entries.iter().find(|e| e.action == action))
    }

    /// Best value among actions recorded for `state`, 0 if none.
    pub fn max_value(&self, state: &str) -> f64 {
        self.states
            .get(state)
            .and_then(|entries| {
                entries
                    .iter()
                    .map(|e| e.value)
                    .fold(None, |best: Option<f64>, v| Some(best.map_or(v, |b| b.max(v))))
            })
            .unwrap_or(0.0)
    }

    /// Entry for the pair, inserted with value 0 and no visits if missing.
    pub fn entry_mut(&mut self, state: &str, action: &str) -> &mut ValueTableEntry {
        let entries = self.states.entry(state.to_string()).or_default();
        let idx = match entries.iter().position(|e| e.action == action) {
            Some(idx) => idx,
            None => {
                entries.push(ValueTableEntry {
                    state: state.to_string(),
                    action: action.to_string(),
                    value: 0.0,
                    visits: 0,
                });
                entries.len() - 1
            }
        };
        &mut entries[idx]
    }

    /// All actions recorded for `state`, in first-seen order.
    pub fn actions(&self, state: &str) -> &[ValueTableEntry] {
        self.states.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of `(state, action)` pairs.
    pub fn len(&self) -> usize {
        self.states.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn export(&self) -> Vec<ValueTableEntry> {
        let mut keys: Vec<&String> = self.states.keys().collect();
        keys.sort();
        keys.into_iter()
            .flat_map(|k| self.states[k.as_str()].iter().cloned())
            .collect()
    }

    /// Replace the whole table.
    pub fn import(&mut self, entries: Vec<ValueTableEntry>) {
        self.states.clear();
        for entry in entries {
            let slot = self.entry_mut(&entry.state, &entry.action);
            slot.value = entry.value;
            slot.visits = entry.visits;
        }
    }
}
