//! Q-table decoding: sparse `"(S, A)" -> {sub: value}` wire tables into a
//! dense `state -> action -> sub_action -> value` grid for display.
//!
//! Decoding never fails. Anything that cannot be read as a wire table, or any
//! key that is not a `(state, action)` pair of numbers, yields the empty
//! [`DecodedTable`]. Missing cells are filled with `0.0`, so a stored zero and
//! an absent entry look the same once decoded.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Q-table as sent by the backend.
pub type WireQTable = HashMap<String, HashMap<String, f64>>;

/// `state -> action -> sub_action -> value`.
pub type Grid = BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DecodedTable {
    /// Unique states, numeric ascending.
    pub states: Vec<String>,
    /// Unique actions, numeric ascending.
    pub actions: Vec<String>,
    /// Unique inner keys across all cells, numeric ascending.
    #[serde(rename = "subActions")]
    pub sub_actions: Vec<String>,
    pub table: Grid,
}

impl DecodedTable {
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn value(&self, state: &str, action: &str, sub_action: &str) -> Option<f64> {
        self.table.get(state)?.get(action)?.get(sub_action).copied()
    }

    /// Number of columns when rendered as one row per state.
    pub fn column_count(&self) -> usize {
        self.actions.len() * self.sub_actions.len()
    }
}

/// Decode a typed wire table.
pub fn decode(wire: &WireQTable) -> DecodedTable {
    match try_decode(wire) {
        Some(decoded) => decoded,
        None => {
            debug!(keys = wire.len(), "Malformed Q-table key, rendering empty table");
            DecodedTable::default()
        }
    }
}

/// Decode a JSON value as received inside an API payload. A string value is
/// treated as JSON-encoded text.
pub fn decode_value(value: &serde_json::Value) -> DecodedTable {
    if let serde_json::Value::String(text) = value {
        return decode_str(text);
    }
    match WireQTable::deserialize(value) {
        Ok(wire) => decode(&wire),
        Err(e) => {
            debug!(error = %e, "Q-table payload is not a wire table");
            DecodedTable::default()
        }
    }
}

/// Decode JSON text.
pub fn decode_str(text: &str) -> DecodedTable {
    match serde_json::from_str::<WireQTable>(text) {
        Ok(wire) => decode(&wire),
        Err(e) => {
            debug!(error = %e, "Failed to parse Q-table JSON");
            DecodedTable::default()
        }
    }
}

/// Fixed-point rendering used for every cell.
pub fn format_cell(value: f64) -> String {
    format!("{:.3}", value)
}

/// Split `"(S, A)"` into its two trimmed, numeric tokens.
pub fn parse_key(key: &str) -> Option<(String, String)> {
    let stripped: String = key.chars().filter(|c| *c != '(' && *c != ')').collect();
    let mut parts = stripped.split(',');
    let state = parts.next()?.trim();
    let action = parts.next()?.trim();
    if parts.next().is_some() {
        return None;
    }
    numeric(state)?;
    numeric(action)?;
    Some((state.to_string(), action.to_string()))
}

/// Rebuild the wire key for a cell. The separator is always `", "`.
pub fn wire_key(state: &str, action: &str) -> String {
    format!("({}, {})", state, action)
}

fn try_decode(wire: &WireQTable) -> Option<DecodedTable> {
    let mut states = BTreeSet::new();
    let mut actions = BTreeSet::new();
    let mut sub_actions = BTreeSet::new();

    for (key, inner) in wire {
        let (state, action) = parse_key(key)?;
        states.insert(state);
        actions.insert(action);
        for sub in inner.keys() {
            numeric(sub)?;
            sub_actions.insert(sub.clone());
        }
    }

    let states = sort_numeric(states);
    let actions = sort_numeric(actions);
    let sub_actions = sort_numeric(sub_actions);

    let mut table = Grid::new();
    for state in &states {
        let row = table.entry(state.clone()).or_default();
        for action in &actions {
            let source = wire.get(&wire_key(state, action));
            let cell = sub_actions
                .iter()
                .map(|sub| {
                    let value = source.and_then(|inner| inner.get(sub)).copied().unwrap_or(0.0);
                    (sub.clone(), value)
                })
                .collect();
            row.insert(action.clone(), cell);
        }
    }

    Some(DecodedTable {
        states,
        actions,
        sub_actions,
        table,
    })
}

fn numeric(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn sort_numeric(set: BTreeSet<String>) -> Vec<String> {
    let mut keyed: Vec<(f64, String)> = set
        .into_iter()
        .filter_map(|s| numeric(&s).map(|n| (n, s)))
        .collect();
    // Equal numbers with different spelling ("1" / "1.0") keep a stable order.
    keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then_with(|| a.1.cmp(&b.1)));
    keyed.into_iter().map(|(_, s)| s).collect()
}
