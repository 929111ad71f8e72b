//! ApiClient against an in-process stub backend.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use fedrl_client::ApiClient;
use fedrl_core::models::ControlAction;
use fedrl_core::storage::{CookieJar, CookieOptions};
use fedrl_core::session::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use fedrl_core::token::{encode_unsigned, is_access_token_expired};
use fedrl_core::{qtable, ClientConfig, FedrlError, SessionManager};

// ─── Stub backend ────────────────────────────────────────────────────────────

#[derive(Default)]
struct StubInner {
    refresh_calls: AtomicUsize,
    reject_refresh: AtomicBool,
    seen_auth: Mutex<Vec<Option<String>>>,
}

#[derive(Clone, Default)]
struct Stub(Arc<StubInner>);

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn access_token(user_id: i64, ttl_secs: i64) -> String {
    encode_unsigned(&json!({
        "token_type": "access",
        "user_id": user_id,
        "username": "ana",
        "exp": Utc::now().timestamp() + ttl_secs,
    }))
}

fn detail(status: StatusCode, msg: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "detail": msg })))
}

impl Stub {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
        self.0.seen_auth.lock().unwrap().push(bearer.clone());
        match bearer {
            Some(token) if !is_access_token_expired(&token) => Ok(()),
            _ => Err(detail(
                StatusCode::UNAUTHORIZED,
                "Authentication credentials were not provided.",
            )),
        }
    }

    fn refresh_calls(&self) -> usize {
        self.0.refresh_calls.load(Ordering::SeqCst)
    }

    fn last_auth(&self) -> Option<String> {
        self.0.seen_auth.lock().unwrap().last().cloned().flatten()
    }
}

async fn login(Json(body): Json<Value>) -> Reply {
    if body["email"] == "ana@example.com" && body["password"] == "s3cret" {
        return Ok(Json(json!({ "access": access_token(1, 3600), "refresh": "refresh-1" })));
    }
    Err(detail(
        StatusCode::UNAUTHORIZED,
        "No active account found with the given credentials",
    ))
}

async fn register(Json(body): Json<Value>) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if body["email"] == "taken@example.com" {
        return Err(detail(StatusCode::BAD_REQUEST, "user with this email already exists."));
    }
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user": { "id": 9, "full_name": body["full_name"], "email": body["email"] }
        })),
    ))
}

async fn refresh(State(stub): State<Stub>, Json(_body): Json<Value>) -> Reply {
    stub.0.refresh_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(30)).await;
    if stub.0.reject_refresh.load(Ordering::SeqCst) {
        return Err(detail(StatusCode::UNAUTHORIZED, "Token is invalid or expired"));
    }
    Ok(Json(json!({ "access": access_token(2, 3600), "refresh": "refresh-2" })))
}

async fn runs(State(stub): State<Stub>, headers: HeaderMap) -> Reply {
    stub.authorize(&headers)?;
    Ok(Json(json!([
        { "id": "550e8400-e29b-41d4-a716-446655440000", "started_at": "2024-01-15T14:30:22Z", "ended_at": null, "is_active": true },
        { "id": "6ba7b810-9dad-11d1-80b4-00c04fd430c8", "started_at": "2024-01-14T09:00:00Z", "ended_at": "2024-01-14T10:00:00Z", "is_active": false }
    ])))
}

async fn global_qtables(State(stub): State<Stub>, headers: HeaderMap) -> Reply {
    stub.authorize(&headers)?;
    Ok(Json(json!([
        {
            "id": "AGG-001",
            "q_table": { "(0, 0)": {"0": 0.5}, "(1, 1)": {"0": 0.8, "1": 0.2} },
            "aggregated_at": "2024-01-15T15:45:22Z",
            "performance_score": 94.7
        },
        { "id": "AGG-002", "q_table": {"bogus": {"0": 1.0}}, "aggregated_at": null, "performance_score": 81.0 }
    ])))
}

async fn events(State(stub): State<Stub>, headers: HeaderMap) -> Reply {
    stub.authorize(&headers)?;
    Ok(Json(json!([{
        "id": "e1", "run": "r1", "car": "CAR-001", "event_type": "progress",
        "data": { "episode": 120, "progress": 0.4 }, "timestamp": "2024-01-15T14:31:00Z"
    }])))
}

async fn client_qtables(State(stub): State<Stub>, headers: HeaderMap) -> Reply {
    stub.authorize(&headers)?;
    Ok(Json(json!([{ "id": "c1", "run": "r1", "client": "CAR-002", "q_table": {"(0, 0)": {"0": 1.5}} }])))
}

async fn test_results(State(stub): State<Stub>, headers: HeaderMap) -> Reply {
    stub.authorize(&headers)?;
    Ok(Json(json!([{ "test_id": "T-1", "car_id": "CAR-001", "scenario": "Urban Navigation", "status": "completed", "score": 94.7, "episodes": 1000, "avg_reward": 0.847 }])))
}

async fn summary(State(stub): State<Stub>, headers: HeaderMap) -> Reply {
    stub.authorize(&headers)?;
    Ok(Json(json!({ "clients": 12, "runs": 4, "global_tables": 3 })))
}

async fn aggregate(State(stub): State<Stub>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    stub.authorize(&headers)?;
    Ok(Json(json!({ "status": "aggregated", "received": body })))
}

async fn evaluate(State(stub): State<Stub>, headers: HeaderMap) -> Reply {
    stub.authorize(&headers)?;
    Ok(Json(json!({ "status": "evaluated" })))
}

async fn control(State(stub): State<Stub>, Path(action): Path<String>, headers: HeaderMap) -> Reply {
    stub.authorize(&headers)?;
    Ok(Json(json!({ "action": action })))
}

async fn spawn_stub(stub: Stub) -> String {
    let app = Router::new()
        .route("/api/v1/accounts/login/", post(login))
        .route("/api/v1/accounts/admin/register/", post(register))
        .route("/api/v1/refresh/", post(refresh))
        .route("/api/v1/federated/runs/", get(runs))
        .route("/api/v1/federated/events/", get(events))
        .route("/api/v1/federated/global-qtables/", get(global_qtables))
        .route("/api/v1/federated/client-qtables/", get(client_qtables))
        .route("/api/v1/federated/list/test-results/", get(test_results))
        .route("/api/v1/federated/summary/counts/", get(summary))
        .route("/api/v1/federated/aggregate/", post(aggregate))
        .route("/api/v1/federated/evaluate/global-qtables/", post(evaluate))
        .route("/api/v1/federated/control/{action}/", post(control))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api/v1/", addr)
}

async fn client_with(stub: &Stub, session: SessionManager) -> ApiClient {
    let base_url = spawn_stub(stub.clone()).await;
    ApiClient::new(ClientConfig::default().with_base_url(base_url), session).unwrap()
}

fn session_with_expired_access() -> SessionManager {
    let mut session = SessionManager::in_memory();
    session
        .set_auth_user(&access_token(1, -60), "refresh-1")
        .unwrap();
    session
}

// ─── Authentication ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_starts_session() {
    let stub = Stub::default();
    let client = client_with(&stub, SessionManager::in_memory()).await;

    let pair = client.login("ana@example.com", "s3cret").await.unwrap();
    assert_eq!(pair.refresh, "refresh-1");

    let session = client.session();
    let session = session.lock().await;
    assert!(session.is_logged_in());
    assert_eq!(session.access_token(), Some(pair.access.as_str()));
    assert_eq!(session.user_summary().username.as_deref(), Some("ana"));
}

#[tokio::test]
async fn test_login_failure_reports_backend_detail() {
    let stub = Stub::default();
    let client = client_with(&stub, SessionManager::in_memory()).await;

    let err = client.login("ana@example.com", "wrong").await.unwrap_err();
    match &err {
        FedrlError::InvalidCredentials(msg) => {
            assert_eq!(msg, "No active account found with the given credentials")
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_auth_failure());
    assert!(!client.session().lock().await.is_logged_in());
}

#[tokio::test]
async fn test_register_logs_in_afterwards() {
    let stub = Stub::default();
    let client = client_with(&stub, SessionManager::in_memory()).await;

    let created = client
        .register("ana@example.com", "Ana Lima", "s3cret")
        .await
        .unwrap();
    assert_eq!(created.user.id, 9);
    assert_eq!(created.user.full_name, "Ana Lima");
    assert!(client.session().lock().await.is_logged_in());
}

#[tokio::test]
async fn test_register_succeeds_even_if_login_fails() {
    let stub = Stub::default();
    let client = client_with(&stub, SessionManager::in_memory()).await;

    let created = client
        .register("new@example.com", "New User", "pw")
        .await
        .unwrap();
    assert_eq!(created.user.email, "new@example.com");
    assert!(!client.session().lock().await.is_logged_in());
}

#[tokio::test]
async fn test_register_failure() {
    let stub = Stub::default();
    let client = client_with(&stub, SessionManager::in_memory()).await;

    let err = client
        .register("taken@example.com", "Ana", "pw")
        .await
        .unwrap_err();
    match err {
        FedrlError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "user with this email already exists.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_refresh_without_token() {
    let stub = Stub::default();
    let client = client_with(&stub, SessionManager::in_memory()).await;
    assert!(matches!(client.refresh().await, Err(FedrlError::NoRefreshToken)));
    assert_eq!(stub.refresh_calls(), 0);
}

#[tokio::test]
async fn test_refresh_does_not_store_pair() {
    let stub = Stub::default();
    let client = client_with(&stub, session_with_expired_access()).await;

    let pair = client.refresh().await.unwrap();
    assert_eq!(pair.refresh, "refresh-2");
    assert_eq!(
        client.session().lock().await.refresh_token(),
        Some("refresh-1")
    );
}

// ─── Refresh guard ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fresh_token_passes_through() {
    let stub = Stub::default();
    let mut session = SessionManager::in_memory();
    let token = access_token(1, 3600);
    session.set_auth_user(&token, "refresh-1").unwrap();
    let client = client_with(&stub, session).await;

    let runs = client.runs().await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(stub.refresh_calls(), 0);
    assert_eq!(stub.last_auth(), Some(token));
}

#[tokio::test]
async fn test_expired_token_is_refreshed_before_request() {
    let stub = Stub::default();
    let client = client_with(&stub, session_with_expired_access()).await;

    let runs = client.runs().await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(stub.refresh_calls(), 1);

    let session = client.session();
    let session = session.lock().await;
    assert_eq!(session.refresh_token(), Some("refresh-2"));
    assert_eq!(stub.last_auth().as_deref(), session.access_token());
    assert_eq!(
        session.user().and_then(|u| u.user_id.clone()),
        Some(fedrl_core::models::UserId::Int(2))
    );
}

#[tokio::test]
async fn test_missing_access_token_is_refreshed_before_request() {
    let stub = Stub::default();
    let mut jar = CookieJar::in_memory();
    jar.set(REFRESH_TOKEN_COOKIE, "refresh-1", CookieOptions::secure_strict(7))
        .unwrap();
    let client = client_with(&stub, SessionManager::init(jar)).await;

    let runs = client.runs().await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(stub.refresh_calls(), 1);

    let session = client.session();
    let session = session.lock().await;
    let access = session.access_token().expect("access token restored");
    assert_eq!(stub.last_auth().as_deref(), Some(access));
    assert_eq!(session.refresh_token(), Some("refresh-2"));
    assert!(session.is_logged_in());
}

#[tokio::test]
async fn test_rejected_refresh_forces_logout() {
    let stub = Stub::default();
    stub.0.reject_refresh.store(true, Ordering::SeqCst);
    let client = client_with(&stub, session_with_expired_access()).await;

    let err = client.runs().await.unwrap_err();
    assert!(matches!(err, FedrlError::RefreshRejected(401)));
    assert!(err.is_auth_failure());
    assert_eq!(stub.refresh_calls(), 1, "refresh must not be retried");

    let session = client.session();
    let session = session.lock().await;
    assert!(!session.is_logged_in());
    assert_eq!(session.access_token(), None);
    assert_eq!(session.refresh_token(), None);
}

#[tokio::test]
async fn test_expired_access_without_refresh_token_logs_out() {
    let stub = Stub::default();
    let mut jar = CookieJar::in_memory();
    jar.set(ACCESS_TOKEN_COOKIE, access_token(1, -60), CookieOptions::secure_strict(1))
        .unwrap();
    let client = client_with(&stub, SessionManager::init(jar)).await;

    let err = client.runs().await.unwrap_err();
    assert!(matches!(err, FedrlError::NoRefreshToken));
    assert_eq!(client.session().lock().await.access_token(), None);
}

#[tokio::test]
async fn test_anonymous_request_reports_api_error() {
    let stub = Stub::default();
    let client = client_with(&stub, SessionManager::in_memory()).await;

    let err = client.runs().await.unwrap_err();
    match &err {
        FedrlError::Api { status, message } => {
            assert_eq!(*status, 401);
            assert_eq!(message, "Authentication credentials were not provided.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(stub.last_auth(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_requests_share_one_refresh() {
    let stub = Stub::default();
    let client = client_with(&stub, session_with_expired_access()).await;

    let (a, b, c) = tokio::join!(client.runs(), client.events(), client.summary_counts());
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(stub.refresh_calls(), 1);
}

#[tokio::test]
async fn test_restore_session_refreshes_expired_access() {
    let stub = Stub::default();
    let client = client_with(&stub, session_with_expired_access()).await;

    client.restore_session().await.unwrap();
    assert_eq!(stub.refresh_calls(), 1);
    let session = client.session();
    let session = session.lock().await;
    assert!(!session.needs_refresh());
    assert!(session.is_logged_in());
}

#[tokio::test]
async fn test_restore_session_failure_logs_out() {
    let stub = Stub::default();
    stub.0.reject_refresh.store(true, Ordering::SeqCst);
    let client = client_with(&stub, session_with_expired_access()).await;

    assert!(client.restore_session().await.is_err());
    assert!(!client.session().lock().await.is_logged_in());
}

#[tokio::test]
async fn test_restore_session_without_tokens_is_noop() {
    let stub = Stub::default();
    let client = client_with(&stub, SessionManager::in_memory()).await;
    client.restore_session().await.unwrap();
    assert_eq!(stub.refresh_calls(), 0);
}

#[tokio::test]
async fn test_logout_is_client_side() {
    let stub = Stub::default();
    let client = client_with(&stub, SessionManager::in_memory()).await;
    client.login("ana@example.com", "s3cret").await.unwrap();
    client.logout().await.unwrap();
    assert!(!client.session().lock().await.is_logged_in());
    assert!(stub.0.seen_auth.lock().unwrap().is_empty());
}

// ─── Endpoints ───────────────────────────────────────────────────────────────

async fn logged_in_client(stub: &Stub) -> ApiClient {
    let client = client_with(stub, SessionManager::in_memory()).await;
    client.login("ana@example.com", "s3cret").await.unwrap();
    client
}

#[tokio::test]
async fn test_global_qtables_decode_per_table() {
    let stub = Stub::default();
    let client = logged_in_client(&stub).await;

    let tables = client.global_qtables().await.unwrap();
    assert_eq!(tables.len(), 2);

    let good = qtable::decode_value(&tables[0].q_table);
    assert_eq!(good.value("1", "1", "1"), Some(0.2));
    assert_eq!(good.value("0", "1", "0"), Some(0.0));

    // A malformed table renders empty without failing the listing.
    assert!(qtable::decode_value(&tables[1].q_table).is_empty());
}

#[tokio::test]
async fn test_listing_endpoints() {
    let stub = Stub::default();
    let client = logged_in_client(&stub).await;

    let events = client.events().await.unwrap();
    assert_eq!(events[0].data.episode, Some(120));

    let tables = client.client_qtables().await.unwrap();
    assert_eq!(tables[0].car.as_deref(), Some("CAR-002"));

    let results = client.test_results().await.unwrap();
    assert_eq!(results[0].id.as_deref(), Some("T-1"));
    assert_eq!(results[0].car.as_deref(), Some("CAR-001"));

    let counts = client.summary_counts().await.unwrap();
    assert_eq!(counts.0.get("clients"), Some(&json!(12)));
}

#[tokio::test]
async fn test_aggregate_sends_run_ids() {
    let stub = Stub::default();
    let client = logged_in_client(&stub).await;

    let reply = client
        .aggregate(&["r1".to_string(), "r2".to_string()])
        .await
        .unwrap();
    assert_eq!(reply["received"]["run_ids"], json!(["r1", "r2"]));

    let reply = client.aggregate(&[]).await.unwrap();
    assert_eq!(reply["received"], json!({}));
}

#[tokio::test]
async fn test_evaluate_and_control() {
    let stub = Stub::default();
    let client = logged_in_client(&stub).await;

    assert_eq!(
        client.evaluate_global_qtables().await.unwrap()["status"],
        "evaluated"
    );
    for action in [
        ControlAction::StartTraining,
        ControlAction::StopTraining,
        ControlAction::StartTest,
        ControlAction::GlobalAvailable,
    ] {
        let reply = client.control(action).await.unwrap();
        assert_eq!(reply["action"], action.to_string());
    }
}

#[tokio::test]
async fn test_session_file_round_trip() {
    let tmp = tempfile::TempDir::new().unwrap();
    let stub = Stub::default();
    let base_url = spawn_stub(stub.clone()).await;
    let config = ClientConfig::default()
        .with_base_url(base_url)
        .with_session_file(tmp.path().join("session.yaml"));

    let client = ApiClient::open(config.clone()).unwrap();
    client.login("ana@example.com", "s3cret").await.unwrap();
    client.dispose().await.unwrap();

    let reopened = ApiClient::open(config).unwrap();
    assert!(reopened.session().lock().await.is_logged_in());
    assert!(reopened.runs().await.is_ok());
}
