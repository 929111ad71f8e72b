//! Decoding behaviour of wire Q-tables.

use fedrl_core::qtable::{decode, decode_str, decode_value, DecodedTable, WireQTable};
use serde_json::json;

fn wire(value: serde_json::Value) -> WireQTable {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_reference_example() {
    let decoded = decode(&wire(json!({
        "(0, 0)": {"0": 0.5},
        "(1, 1)": {"0": 0.8, "1": 0.2}
    })));

    assert_eq!(decoded.states, vec!["0", "1"]);
    assert_eq!(decoded.actions, vec!["0", "1"]);
    assert_eq!(decoded.sub_actions, vec!["0", "1"]);
    assert_eq!(decoded.value("0", "1", "0"), Some(0.0));
    assert_eq!(decoded.value("1", "1", "1"), Some(0.2));
    assert_eq!(decoded.value("0", "0", "0"), Some(0.5));
    // Sub-action missing from a present cell defaults to zero too.
    assert_eq!(decoded.value("0", "0", "1"), Some(0.0));
}

#[test]
fn test_every_cell_is_defined() {
    let decoded = decode(&wire(json!({
        "(0, 2)": {"1": 1.0},
        "(3, 0)": {"0": -2.5, "4": 7.0},
        "(1, 1)": {}
    })));

    assert_eq!(decoded.states, vec!["0", "1", "3"]);
    assert_eq!(decoded.actions, vec!["0", "1", "2"]);
    assert_eq!(decoded.sub_actions, vec!["0", "1", "4"]);
    for state in &decoded.states {
        for action in &decoded.actions {
            for sub in &decoded.sub_actions {
                assert!(
                    decoded.value(state, action, sub).is_some(),
                    "missing cell ({state}, {action}, {sub})"
                );
            }
        }
    }
    assert_eq!(decoded.column_count(), 9);
}

#[test]
fn test_states_sort_numerically() {
    let decoded = decode(&wire(json!({
        "(10, 0)": {"0": 1.0},
        "(2, 0)": {"0": 1.0},
        "(1, 0)": {"0": 1.0}
    })));
    assert_eq!(decoded.states, vec!["1", "2", "10"]);
}

#[test]
fn test_sub_actions_sort_numerically() {
    let decoded = decode(&wire(json!({
        "(0, 0)": {"11": 1.0, "3": 2.0, "0": 3.0}
    })));
    assert_eq!(decoded.sub_actions, vec!["0", "3", "11"]);
}

#[test]
fn test_unspaced_key_contributes_indices_but_not_values() {
    // Lookups rebuild keys with ", ", so "(1,1)" only shapes the axes.
    let decoded = decode(&wire(json!({
        "(0, 0)": {"0": 0.5},
        "(1,1)": {"0": 0.9}
    })));
    assert_eq!(decoded.states, vec!["0", "1"]);
    assert_eq!(decoded.value("1", "1", "0"), Some(0.0));
}

#[test]
fn test_malformed_key_yields_empty() {
    let cases = [
        json!({"(0, 0)": {"0": 1.0}, "(1, 2, 3)": {"0": 1.0}}),
        json!({"state": {"0": 1.0}}),
        json!({"(a, b)": {"0": 1.0}}),
        json!({"(0, 0)": {"x": 1.0}}),
    ];
    for case in cases {
        assert_eq!(decode_value(&case), DecodedTable::default(), "case {case}");
    }
}

#[test]
fn test_malformed_json_yields_empty() {
    assert!(decode_str("not json").is_empty());
    assert!(decode_str("[1, 2, 3]").is_empty());
    assert!(decode_str(r#"{"(0, 0)": {"0": "high"}}"#).is_empty());
    assert!(decode_value(&json!(null)).is_empty());
    assert!(decode_value(&json!(42)).is_empty());
}

#[test]
fn test_empty_form_shape() {
    let empty = decode_str("{}");
    assert!(empty.states.is_empty());
    assert!(empty.actions.is_empty());
    assert!(empty.sub_actions.is_empty());
    assert!(empty.table.is_empty());
}

#[test]
fn test_string_payload_is_decoded_as_json() {
    let decoded = decode_value(&json!(r#"{"(0, 1)": {"0": 0.25}}"#));
    assert_eq!(decoded.value("0", "1", "0"), Some(0.25));
}

#[test]
fn test_serialized_form() {
    let decoded = decode_str(r#"{"(0, 0)": {"0": 0.5}}"#);
    let out = serde_json::to_value(&decoded).unwrap();
    assert_eq!(out["states"], json!(["0"]));
    assert_eq!(out["subActions"], json!(["0"]));
    assert!(out.get("sub_actions").is_none());
    assert_eq!(out["table"]["0"]["0"]["0"], json!(0.5));
}
