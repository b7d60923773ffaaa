use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use abtrack_core::config::{Config, StoreBackend};
use abtrack_core::event::{parse_ts, Event};
use abtrack_core::memory::MemoryEventStore;
use abtrack_core::store::{EventPage, EventStore, RangeQuery};
use abtrack_duckdb::DuckDbEventStore;
use abtrack_server::app::build_app;
use abtrack_server::state::AppState;

/// Build a test Config with sensible defaults for integration tests.
fn test_config() -> Config {
    Config {
        port: 0,
        store: StoreBackend::Memory,
        data_dir: "/tmp/abtrack-test".to_string(),
        duckdb_memory_limit: "1GB".to_string(),
        page_size: 1000,
        max_pages: 100,
        event_ttl_days: 30,
        default_window_days: 30,
        request_timeout_secs: 30,
        expiry_interval_secs: 0,
        cors_origins: vec![],
    }
}

/// Create a fresh in-memory store + state + app for each test.
fn setup() -> (Arc<MemoryEventStore>, axum::Router) {
    let store = Arc::new(MemoryEventStore::new());
    let state = Arc::new(AppState::new(store.clone(), test_config()));
    (store, build_app(state))
}

/// Store whose every call fails, standing in for a throttled or unreachable backend.
struct FailingStore;

#[async_trait]
impl EventStore for FailingStore {
    async fn put(&self, _event: &Event) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("ProvisionedThroughputExceededException"))
    }

    async fn query(
        &self,
        _query: &RangeQuery,
        _continuation: Option<&str>,
    ) -> anyhow::Result<EventPage> {
        Err(anyhow::anyhow!("connection reset"))
    }

    async fn expire(&self, _now: DateTime<Utc>) -> anyhow::Result<u64> {
        Err(anyhow::anyhow!("connection reset"))
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("connection reset"))
    }
}

/// Helper: send a POST /api/collect with the given raw body.
fn collect_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/collect")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

/// Helper: extract JSON body from response.
async fn json_body(response: axum::http::Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("parse JSON")
}

// ============================================================
// Writes
// ============================================================
#[tokio::test]
async fn test_log_impression_returns_persisted_record() {
    let (store, app) = setup();
    let before = Utc::now();

    let body = json!({
        "action": "log_impression",
        "experimentId": "cta-color-001",
        "userId": "u1",
        "variant": "A"
    });
    let response = app
        .oneshot(collect_request(&body.to_string()))
        .await
        .expect("request");
    let after = Utc::now();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["message"], "Event logged");
    assert_eq!(json["data"]["experimentId"], "cta-color-001");
    assert_eq!(json["data"]["userId"], "u1");
    assert_eq!(json["data"]["variant"], "A");
    assert_eq!(json["data"]["action"], "log_impression");

    let ts = parse_ts(json["data"]["ts"].as_str().expect("ts string")).expect("valid ts");
    // Stored timestamps are truncated to milliseconds.
    assert!(ts >= before - chrono::Duration::milliseconds(1) && ts <= after);
    let ttl = json["data"]["ttl"].as_i64().expect("ttl");
    assert_eq!(ttl, (ts + chrono::Duration::days(30)).timestamp());

    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_log_click_accepts_legacy_field_names() {
    let (store, app) = setup();

    let body = json!({
        "action": "log_click",
        "experiment_id": "exp1",
        "user_id": "u9",
        "variant": "B"
    });
    let response = app
        .oneshot(collect_request(&body.to_string()))
        .await
        .expect("request");

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data"]["experimentId"], "exp1");
    assert_eq!(json["data"]["userId"], "u9");

    let records = store.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action.as_deref(), Some("log_click"));
}

#[tokio::test]
async fn test_duplicate_writes_are_both_persisted() {
    let (store, app) = setup();
    let body = json!({
        "action": "log_impression",
        "experimentId": "exp1",
        "userId": "u1",
        "variant": "A"
    })
    .to_string();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(collect_request(&body))
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn test_missing_variant_returns_400_and_no_write() {
    let (store, app) = setup();

    let body = json!({
        "action": "log_impression",
        "experimentId": "cta-color-001",
        "userId": "u1"
    });
    let response = app
        .oneshot(collect_request(&body.to_string()))
        .await
        .expect("request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(
        json,
        json!({ "error": "Missing required fields: experimentId, userId, variant, action" })
    );
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_empty_required_field_returns_400() {
    let (store, app) = setup();

    let body = json!({
        "action": "log_click",
        "experimentId": "exp1",
        "userId": "",
        "variant": "A"
    });
    let response = app
        .oneshot(collect_request(&body.to_string()))
        .await
        .expect("request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(store.is_empty().await);
}

// ============================================================
// Dispatch
// ============================================================
#[tokio::test]
async fn test_unknown_action_returns_400() {
    let (store, app) = setup();

    let body = json!({
        "action": "frobnicate",
        "experimentId": "exp1",
        "userId": "u1",
        "variant": "A"
    });
    let response = app
        .oneshot(collect_request(&body.to_string()))
        .await
        .expect("request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Unknown action: frobnicate");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_empty_body_is_unknown_action() {
    let (_store, app) = setup();

    let response = app
        .oneshot(collect_request(""))
        .await
        .expect("request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_json_returns_500_with_message() {
    let (_store, app) = setup();

    let response = app
        .oneshot(collect_request("{ not-json"))
        .await
        .expect("request");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Internal server error");
    assert!(!json["message"].as_str().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_root_path_accepts_collect_requests() {
    let (store, app) = setup();

    let body = json!({
        "action": "log_impression",
        "experimentId": "exp1",
        "userId": "u1",
        "variant": "A"
    });
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request");
    let response = app.oneshot(request).await.expect("request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.len().await, 1);
}

// ============================================================
// Store failures
// ============================================================
#[tokio::test]
async fn test_store_write_failure_returns_500() {
    let state = Arc::new(AppState::new(Arc::new(FailingStore), test_config()));
    let app = build_app(state);

    let body = json!({
        "action": "log_impression",
        "experimentId": "exp1",
        "userId": "u1",
        "variant": "A"
    });
    let response = app
        .oneshot(collect_request(&body.to_string()))
        .await
        .expect("request");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Internal server error");
    assert_eq!(json["message"], "ProvisionedThroughputExceededException");
}

#[tokio::test]
async fn test_validation_runs_before_store_is_touched() {
    // A failing store must not turn a client error into a server error.
    let state = Arc::new(AppState::new(Arc::new(FailingStore), test_config()));
    let app = build_app(state);

    let body = json!({ "action": "log_click", "experimentId": "exp1" });
    let response = app
        .oneshot(collect_request(&body.to_string()))
        .await
        .expect("request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================
// CORS
// ============================================================
#[tokio::test]
async fn test_cors_preflight_is_answered() {
    let (_store, app) = setup();

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/collect")
        .header("origin", "https://experiments.example.com")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .expect("build request");
    let response = app.oneshot(request).await.expect("request");

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

// ============================================================
// End to end over DuckDB
// ============================================================
#[tokio::test]
async fn test_write_then_stats_over_duckdb() {
    let mut config = test_config();
    config.store = StoreBackend::DuckDb;
    let store = Arc::new(DuckDbEventStore::open_in_memory_with_page_size(1).expect("in-memory DuckDB"));
    let state = Arc::new(AppState::new(store, config));
    let app = build_app(state);

    for (user, variant, action) in [
        ("u1", "A", "log_impression"),
        ("u1", "A", "log_click"),
        ("u2", "B", "log_impression"),
    ] {
        let body = json!({
            "action": action,
            "experimentId": "exp1",
            "userId": user,
            "variant": variant
        });
        let response = app
            .clone()
            .oneshot(collect_request(&body.to_string()))
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(collect_request(
            &json!({ "action": "get_stats", "experimentId": "exp1" }).to_string(),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["totals"]["impressions"], 2);
    assert_eq!(json["totals"]["clicks"], 1);
    assert_eq!(json["totals"]["ctr"].as_f64(), Some(0.5));
    assert_eq!(json["totals"]["uniqueUsers"], 2);
    assert_eq!(json["variants"]["A"]["ctr"].as_f64(), Some(1.0));
    assert_eq!(json["variants"]["B"]["ctr"].as_f64(), Some(0.0));
}

#[tokio::test]
async fn test_unrepresentable_expiry_returns_500_and_no_write() {
    let store = Arc::new(MemoryEventStore::new());
    let mut config = test_config();
    config.event_ttl_days = 4_000_000_000;
    let app = build_app(Arc::new(AppState::new(store.clone(), config)));

    let body = json!({
        "action": "log_impression",
        "experimentId": "exp1",
        "userId": "u1",
        "variant": "A"
    });
    let response = app
        .oneshot(collect_request(&body.to_string()))
        .await
        .expect("request");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(store.is_empty().await);
}
