//! comfy-table renderings of API payloads.

use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};

use fedrl_core::models::{
    format_timestamp, short_id, ClientEvent, ClientQTable, FederatedRun, GlobalQTable,
    PerformanceBand, SummaryCounts, TestResult,
};
use fedrl_core::qtable::{self, format_cell, DecodedTable};

fn table_with_header<const N: usize>(header: [&str; N]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header);
    table
}

fn opt(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

fn opt_time(value: Option<&str>) -> String {
    value.map(format_timestamp).unwrap_or_else(|| "-".to_string())
}

/// One row per state; columns are `action/sub_action` pairs.
pub fn qtable_grid(decoded: &DecodedTable) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);

    let mut header = vec!["State".to_string()];
    for action in &decoded.actions {
        for sub in &decoded.sub_actions {
            header.push(format!("A{} / {}", action, sub));
        }
    }
    table.set_header(header);

    for state in &decoded.states {
        let mut row = vec![state.clone()];
        for action in &decoded.actions {
            for sub in &decoded.sub_actions {
                let value = decoded.value(state, action, sub).unwrap_or(0.0);
                row.push(format_cell(value));
            }
        }
        table.add_row(row);
    }
    table
}

pub fn global_tables(tables: &[&GlobalQTable]) -> Table {
    let mut table = table_with_header(["ID", "Aggregated", "Score", "States", "Actions"]);
    for t in tables {
        let decoded = qtable::decode_value(&t.q_table);
        let color = match PerformanceBand::of(t.performance_score) {
            PerformanceBand::High => Color::Green,
            PerformanceBand::Medium => Color::Yellow,
            PerformanceBand::Low => Color::Red,
        };
        table.add_row(vec![
            Cell::new(&t.id),
            Cell::new(opt_time(t.aggregated_at.as_deref())),
            Cell::new(format!("{:.1}", t.performance_score)).fg(color),
            Cell::new(decoded.states.len()),
            Cell::new(decoded.actions.len()),
        ]);
    }
    table
}

pub fn client_tables(tables: &[ClientQTable]) -> Table {
    let mut table = table_with_header(["ID", "Run", "Client", "Submitted", "Cells"]);
    for t in tables {
        let decoded = qtable::decode_value(&t.q_table);
        table.add_row(vec![
            short_id(&t.id).to_string(),
            t.run.as_deref().map(short_id).unwrap_or("-").to_string(),
            opt(t.car.as_deref()),
            opt_time(t.created_at.as_deref()),
            (decoded.states.len() * decoded.column_count()).to_string(),
        ]);
    }
    table
}

pub fn runs(runs: &[FederatedRun]) -> Table {
    let mut table = table_with_header(["Run", "Status", "Started", "Ended"]);
    for run in runs {
        table.add_row(vec![
            short_id(&run.id).to_string(),
            run.status_label().to_string(),
            format_timestamp(&run.started_at),
            opt_time(run.ended_at.as_deref()),
        ]);
    }
    table
}

pub fn events(events: &[ClientEvent]) -> Table {
    let mut table = table_with_header(["Time", "Run", "Car", "Event", "Episode", "Progress"]);
    for event in events {
        table.add_row(vec![
            format_timestamp(&event.timestamp),
            short_id(&event.run).to_string(),
            event.car.clone(),
            event.event_type.clone(),
            event
                .data
                .episode
                .map(|e| e.to_string())
                .unwrap_or_else(|| "-".to_string()),
            event
                .data
                .progress
                .map(|p| format!("{:.0}%", p * 100.0))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}

pub fn test_results(results: &[TestResult]) -> Table {
    let mut table = table_with_header([
        "Test", "Car", "Scenario", "Status", "Score", "Episodes", "Avg reward",
    ]);
    for r in results {
        table.add_row(vec![
            opt(r.id.as_deref()),
            opt(r.car.as_deref()),
            opt(r.scenario.as_deref()),
            opt(r.status.as_deref()),
            r.score.map(|s| format!("{:.1}", s)).unwrap_or_else(|| "-".to_string()),
            r.episodes.map(|e| e.to_string()).unwrap_or_else(|| "-".to_string()),
            r.avg_reward.map(format_cell).unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}

pub fn summary(counts: &SummaryCounts) -> Table {
    let mut table = table_with_header(["Metric", "Value"]);
    for (name, value) in &counts.0 {
        let shown = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        table.add_row(vec![name.replace('_', " "), shown]);
    }
    table
}
