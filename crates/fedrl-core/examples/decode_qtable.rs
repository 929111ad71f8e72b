//! Decode a wire-format Q-table and walk the resulting grid.

use fedrl_core::qtable::{decode_str, format_cell};

fn main() {
    let wire = r#"{
        "(0, 0)": {"0": 0.5, "1": 0.25},
        "(1, 1)": {"0": 0.8, "1": 0.2},
        "(2, 0)": {"1": 1.0}
    }"#;

    let decoded = decode_str(wire);
    println!(
        "states={:?} actions={:?} sub_actions={:?}",
        decoded.states, decoded.actions, decoded.sub_actions
    );

    for state in &decoded.states {
        let cells: Vec<String> = decoded
            .actions
            .iter()
            .flat_map(|a| decoded.sub_actions.iter().map(move |s| (a, s)))
            .map(|(a, s)| format_cell(decoded.value(state, a, s).unwrap_or(0.0)))
            .collect();
        println!("{:>4} | {}", state, cells.join("  "));
    }
}
