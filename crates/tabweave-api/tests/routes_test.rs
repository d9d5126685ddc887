//! HTTP surface tests, driven through the router with `oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use tabweave_api::{router, AppState, EngineConfig, PushedTabs, TabWeave};
use tabweave_db::Database;
use tabweave_inference::ContentAnalyzer;

const ARTICLE: &str = "Kubernetes operators reconcile custom resources against the cluster \
    state. The Prometheus adapter exposes custom metrics so the Kubernetes autoscaler can scale \
    workloads on queue depth instead of CPU. Operators watch events, compare desired and actual \
    state, and issue API calls until they converge, which keeps Kubernetes clusters predictable.";

async fn app() -> (Router, AppState) {
    let tabs = Arc::new(PushedTabs::new());
    let engine = TabWeave::new(
        Database::in_memory().await.unwrap(),
        tabs.clone(),
        tabs.clone(),
        ContentAnalyzer::unavailable(),
        EngineConfig::default(),
    )
    .await
    .expect("engine");
    let state = AppState {
        engine: Arc::new(engine),
        tabs,
    };
    (router(state.clone()), state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(value) => Body::from(serde_json::to_vec(&value).unwrap()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn push(app: &Router, handle: i64, title: &str, url: &str, text: Option<&str>) -> (StatusCode, Value) {
    let mut body = json!({ "handle": handle, "title": title, "url": url });
    if let Some(text) = text {
        body["page"] = json!({ "text": text });
    }
    send(app, Method::POST, "/tabs", Some(body)).await
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app().await;
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_push_tab_creates_then_reattaches() {
    let (app, _) = app().await;
    let (status, first) = push(&app, 1, "Docs", "https://docs.example.com/guide", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["created"], true);
    assert_eq!(first["enriched"], false);

    let (status, second) = push(&app, 1, "Docs v2", "https://docs.example.com/guide#top", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["created"], false);
    assert_eq!(second["doc_id"], first["doc_id"]);
}

#[tokio::test]
async fn test_push_tab_rejects_empty_url() {
    let (app, _) = app().await;
    let (status, body) = push(&app, 1, "Blank", "  ", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_suggestions_for_unknown_tab_are_unranked() {
    let (app, _) = app().await;
    push(&app, 2, "Two", "https://two.example.com/", None).await;
    push(&app, 1, "One", "https://one.example.com/", None).await;

    let (status, body) = send(&app, Method::GET, "/suggestions/99", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ranked"], 0);
    let handles: Vec<i64> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["tab_handle"].as_i64().unwrap())
        .collect();
    assert_eq!(handles, vec![1, 2]);
}

#[tokio::test]
async fn test_navigation_strengthens_relationship() {
    let (app, _) = app().await;
    push(&app, 1, "Runbook", "https://wiki.example.com/runbook", None).await;
    push(&app, 2, "Dashboard", "https://dash.example.com/", None).await;

    let (status, event) = send(
        &app,
        Method::POST,
        "/navigation",
        Some(json!({ "from": 1, "to": 2, "trigger": "keyboard" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(event["trigger"], "keyboard");

    let (status, related) = send(&app, Method::GET, "/tabs/1/related", None).await;
    assert_eq!(status, StatusCode::OK);
    let related = related.as_array().unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0]["relationship_type"], "navigation");
    assert_eq!(related[0]["document"]["tab_handle"], 2);
}

#[tokio::test]
async fn test_navigation_errors() {
    let (app, _) = app().await;
    push(&app, 1, "Runbook", "https://wiki.example.com/runbook", None).await;

    let (status, body) = send(&app, Method::POST, "/navigation", Some(json!({ "from": 1, "to": 7 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("tab 7"));

    let (status, _) = send(&app, Method::POST, "/navigation", Some(json!({ "from": 1, "to": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bulk_lifecycle_and_stats() {
    let (app, _) = app().await;
    push(&app, 1, "One", "https://one.example.com/", Some(ARTICLE)).await;
    push(&app, 2, "Two", "https://two.example.com/", None).await;

    let (status, state) = send(&app, Method::POST, "/enrichment/bulk/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["status"], "running");
    assert_eq!(state["queue"], json!([1, 2]));

    let (_, state) = send(&app, Method::POST, "/enrichment/bulk/pause", None).await;
    assert_eq!(state["status"], "paused");
    let (_, again) = send(&app, Method::POST, "/enrichment/bulk/pause", None).await;
    assert_eq!(again["status"], "paused");

    let (_, stats) = send(&app, Method::GET, "/stats", None).await;
    assert_eq!(stats["total_tabs"], 2);
    assert_eq!(stats["indexed_tabs"], 0);
    assert_eq!(stats["bulk_status"], "paused");
    assert_eq!(stats["paused"], true);
    assert_eq!(stats["index_documents"], 2);

    let (_, state) = send(&app, Method::POST, "/enrichment/bulk/resume", None).await;
    assert_eq!(state["status"], "running");
}

#[tokio::test]
async fn test_close_tab() {
    let (app, _) = app().await;
    push(&app, 1, "One", "https://one.example.com/", None).await;

    let (status, _) = send(&app, Method::DELETE, "/tabs/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, "/tabs/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, stats) = send(&app, Method::GET, "/stats", None).await;
    assert_eq!(stats["total_tabs"], 1);
}

#[tokio::test]
async fn test_enqueue_and_activate_unknown_tab() {
    let (app, _) = app().await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/enrichment/incremental",
        Some(json!({ "tab_handle": 5, "priority": "high" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::POST, "/tabs/5/activate", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_activate_and_enqueue_known_tab() {
    let (app, _) = app().await;
    push(&app, 3, "Three", "https://three.example.com/", None).await;

    let (status, body) = send(&app, Method::POST, "/tabs/3/activate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["access_count"], 1);

    let (status, body) = send(
        &app,
        Method::POST,
        "/enrichment/incremental",
        Some(json!({ "tab_handle": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["queued"], true);
}

#[tokio::test]
async fn test_enriched_tabs_are_ranked_by_content() {
    let (app, state) = app().await;
    push(&app, 1, "Operator design", "https://blog.example.com/operators", Some(ARTICLE)).await;
    push(&app, 2, "Autoscaling notes", "https://notes.example.com/autoscaling", Some(ARTICLE)).await;
    push(&app, 3, "Sourdough", "https://bread.example.org/", Some("flour water salt")).await;

    send(&app, Method::POST, "/enrichment/bulk/start", None).await;
    state.engine.pipeline().run_until_idle().await.unwrap();

    let (_, body) = send(&app, Method::GET, "/suggestions/1", None).await;
    assert_eq!(body["mode"], "hybrid");
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["tab_handle"], 2);
    assert!(items[0]["score"].as_f64().unwrap() > 0.0);
    assert!(!items[0]["shared_entities"].as_array().unwrap().is_empty());
    assert_eq!(items[1]["tab_handle"], 3);

    let (_, report) = send(&app, Method::POST, "/maintenance", None).await;
    assert_eq!(report["decay"]["deleted"], 0);
}
