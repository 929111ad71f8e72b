//! Data models for the federated-learning backend API.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Access/refresh JWT pair returned by the login and refresh endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub full_name: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub id: i64,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user: RegisteredUser,
}

/// A user id as carried in token claims; backends emit either form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserId::Int(id) => write!(f, "{}", id),
            UserId::Text(id) => write!(f, "{}", id),
        }
    }
}

/// Identity decoded from the access token's claims.
///
/// Unknown claims are kept in `extra` so nothing the backend adds is lost
/// when the identity is persisted in the `userData` cookie.
/// A claim of the wrong JSON type reads as absent rather than failing the
/// whole object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default, deserialize_with = "lenient")]
    pub user_id: Option<UserId>,
    #[serde(default, deserialize_with = "lenient")]
    pub username: Option<String>,
    /// Expiry in epoch seconds; NumericDate allows a fraction.
    #[serde(default, deserialize_with = "lenient")]
    pub exp: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl UserData {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
        }
    }
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// The two fields the dashboard header shows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct UserSummary {
    pub user_id: Option<UserId>,
    pub username: Option<String>,
}

/// Aggregated Q-table produced by the backend.
///
/// `q_table` stays untyped here: it is decoded on display with
/// [`crate::qtable::decode_value`], which degrades to an empty table on
/// malformed data instead of failing the whole listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalQTable {
    pub id: String,
    #[serde(default)]
    pub q_table: serde_json::Value,
    #[serde(default)]
    pub aggregated_at: Option<String>,
    #[serde(default)]
    pub performance_score: f64,
}

/// Q-table submitted by one client for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientQTable {
    pub id: String,
    #[serde(default)]
    pub run: Option<String>,
    #[serde(default, alias = "client")]
    pub car: Option<String>,
    #[serde(default)]
    pub q_table: serde_json::Value,
    #[serde(default, alias = "submitted_at")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederatedRun {
    pub id: String,
    pub started_at: String,
    #[serde(default)]
    pub ended_at: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

impl FederatedRun {
    pub fn status_label(&self) -> &'static str {
        if self.is_active {
            "ACTIVE"
        } else {
            "FINISHED"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub episode: Option<u64>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Training event reported by a client (car) during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEvent {
    pub id: String,
    pub run: String,
    pub car: String,
    pub event_type: String,
    #[serde(default)]
    pub data: EventData,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    #[serde(default, alias = "test_id")]
    pub id: Option<String>,
    #[serde(default, alias = "car_id")]
    pub car: Option<String>,
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub episodes: Option<u64>,
    #[serde(default)]
    pub avg_reward: Option<f64>,
    #[serde(default, alias = "start_time")]
    pub started_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Dashboard counters (clients, runs, tables, ...), keyed by backend name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SummaryCounts(pub BTreeMap<String, serde_json::Value>);

#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub run_ids: Vec<String>,
}

/// Training control endpoints under `/federated/control/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    StartTraining,
    StopTraining,
    StartTest,
    GlobalAvailable,
}

impl ControlAction {
    pub fn path(&self) -> &'static str {
        match self {
            ControlAction::StartTraining => "/federated/control/start_training/",
            ControlAction::StopTraining => "/federated/control/stop_training/",
            ControlAction::StartTest => "/federated/control/start_test/",
            ControlAction::GlobalAvailable => "/federated/control/global_available/",
        }
    }
}

impl std::fmt::Display for ControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ControlAction::StartTraining => "start_training",
            ControlAction::StopTraining => "stop_training",
            ControlAction::StartTest => "start_test",
            ControlAction::GlobalAvailable => "global_available",
        };
        f.write_str(name)
    }
}

// ─── Listing helpers ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceBand {
    High,
    Medium,
    Low,
}

impl PerformanceBand {
    pub fn of(score: f64) -> Self {
        if score >= 90.0 {
            PerformanceBand::High
        } else if score >= 80.0 {
            PerformanceBand::Medium
        } else {
            PerformanceBand::Low
        }
    }
}

/// Best and average `performance_score`, both 0 for an empty listing.
pub fn performance_stats(tables: &[GlobalQTable]) -> (f64, f64) {
    if tables.is_empty() {
        return (0.0, 0.0);
    }
    let best = tables
        .iter()
        .map(|t| t.performance_score)
        .fold(f64::NEG_INFINITY, f64::max);
    let avg = tables.iter().map(|t| t.performance_score).sum::<f64>() / tables.len() as f64;
    (best, avg)
}

/// Case-insensitive substring match on table id.
pub fn filter_by_id<'a>(tables: &'a [GlobalQTable], needle: &str) -> Vec<&'a GlobalQTable> {
    let needle = needle.to_lowercase();
    tables
        .iter()
        .filter(|t| t.id.to_lowercase().contains(&needle))
        .collect()
}

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Render an RFC 3339 timestamp in local time; unparsable input is echoed.
pub fn format_timestamp(iso: &str) -> String {
    match DateTime::parse_from_rfc3339(iso) {
        Ok(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => iso.to_string(),
    }
}
