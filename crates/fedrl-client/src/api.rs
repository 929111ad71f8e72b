//! Typed wrappers for the `/federated/` endpoints.

use serde_json::Value;

use fedrl_core::models::{
    AggregateRequest, ClientEvent, ClientQTable, ControlAction, FederatedRun, GlobalQTable,
    SummaryCounts, TestResult,
};
use fedrl_core::Result;

use crate::ApiClient;

pub const CLIENT_QTABLES_PATH: &str = "/federated/client-qtables/";
pub const GLOBAL_QTABLES_PATH: &str = "/federated/global-qtables/";
pub const RUNS_PATH: &str = "/federated/runs/";
pub const EVENTS_PATH: &str = "/federated/events/";
pub const TEST_RESULTS_PATH: &str = "/federated/list/test-results/";
pub const SUMMARY_COUNTS_PATH: &str = "/federated/summary/counts/";
pub const AGGREGATE_PATH: &str = "/federated/aggregate/";
pub const EVALUATE_PATH: &str = "/federated/evaluate/global-qtables/";

impl ApiClient {
    pub async fn client_qtables(&self) -> Result<Vec<ClientQTable>> {
        self.get_json(CLIENT_QTABLES_PATH).await
    }

    pub async fn global_qtables(&self) -> Result<Vec<GlobalQTable>> {
        self.get_json(GLOBAL_QTABLES_PATH).await
    }

    pub async fn runs(&self) -> Result<Vec<FederatedRun>> {
        self.get_json(RUNS_PATH).await
    }

    pub async fn events(&self) -> Result<Vec<ClientEvent>> {
        self.get_json(EVENTS_PATH).await
    }

    pub async fn test_results(&self) -> Result<Vec<TestResult>> {
        self.get_json(TEST_RESULTS_PATH).await
    }

    pub async fn summary_counts(&self) -> Result<SummaryCounts> {
        self.get_json(SUMMARY_COUNTS_PATH).await
    }

    /// Ask the backend to aggregate client tables; an empty `run_ids` lets
    /// the backend pick.
    pub async fn aggregate(&self, run_ids: &[String]) -> Result<Value> {
        let body = serde_json::to_value(AggregateRequest {
            run_ids: run_ids.to_vec(),
        })?;
        self.post_json(AGGREGATE_PATH, body).await
    }

    /// Re-score all global tables. Fetch them again afterwards to see the
    /// new `performance_score` values.
    pub async fn evaluate_global_qtables(&self) -> Result<Value> {
        self.post_json(EVALUATE_PATH, Value::Object(Default::default()))
            .await
    }

    pub async fn control(&self, action: ControlAction) -> Result<Value> {
        self.post_json(action.path(), Value::Object(Default::default()))
            .await
    }
}
