//! HTTP routes for the browser extension.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use tabweave_core::{NavigationTrigger, PageExtract, TabHandle, TabSnapshot};
use tabweave_jobs::Priority;

use crate::engine::TabWeave;
use crate::error::ApiError;
use crate::pushed::PushedTabs;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TabWeave>,
    pub tabs: Arc<PushedTabs>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/tabs", post(push_tab))
        .route("/tabs/:handle", delete(close_tab))
        .route("/tabs/:handle/activate", post(activate_tab))
        .route("/tabs/:handle/reindex", post(reindex_tab))
        .route("/tabs/:handle/related", get(related_tabs))
        .route("/suggestions/:handle", get(suggestions))
        .route("/navigation", post(record_navigation))
        .route("/enrichment/bulk/start", post(start_bulk))
        .route("/enrichment/bulk/pause", post(pause_bulk))
        .route("/enrichment/bulk/resume", post(resume_bulk))
        .route("/enrichment/incremental", post(enqueue_incremental))
        .route("/stats", get(stats))
        .route("/maintenance", post(maintenance))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
pub struct PushTabRequest {
    #[serde(flatten)]
    pub tab: TabSnapshot,
    /// Page text, when the extension could read it.
    #[serde(default)]
    pub page: Option<PageExtract>,
}

#[derive(Debug, Serialize)]
struct PushTabResponse {
    doc_id: Uuid,
    created: bool,
    enriched: bool,
}

async fn push_tab(
    State(state): State<AppState>,
    Json(req): Json<PushTabRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.tab.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url must not be empty".to_string()));
    }
    state.tabs.upsert(req.tab.clone(), req.page).await;
    let observed = state.engine.tab_updated(&req.tab, Utc::now()).await?;

    let status = if observed.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(PushTabResponse {
            doc_id: observed.document.id,
            created: observed.created,
            enriched: observed.document.is_enriched(),
        }),
    ))
}

async fn close_tab(
    State(state): State<AppState>,
    Path(handle): Path<TabHandle>,
) -> Result<impl IntoResponse, ApiError> {
    let pushed = state.tabs.remove(handle).await;
    let known = state.engine.tab_closed(handle).await?;
    if !pushed && !known {
        return Err(ApiError::NotFound(format!("tab {}", handle)));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn activate_tab(
    State(state): State<AppState>,
    Path(handle): Path<TabHandle>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = state.engine.tab_activated(handle, Utc::now()).await?;
    Ok(Json(serde_json::json!({
        "doc_id": doc.id,
        "access_count": doc.access_count,
    })))
}

async fn reindex_tab(
    State(state): State<AppState>,
    Path(handle): Path<TabHandle>,
) -> Result<impl IntoResponse, ApiError> {
    let queued = state.engine.invalidate_tab(handle).await?;
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "queued": queued }))))
}

async fn related_tabs(
    State(state): State<AppState>,
    Path(handle): Path<TabHandle>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.related_tabs(handle).await?))
}

async fn suggestions(
    State(state): State<AppState>,
    Path(handle): Path<TabHandle>,
) -> impl IntoResponse {
    Json(state.engine.get_suggestions(handle, Utc::now()).await)
}

#[derive(Debug, Deserialize)]
pub struct NavigationRequest {
    pub from: TabHandle,
    pub to: TabHandle,
    #[serde(default)]
    pub trigger: NavigationTrigger,
}

async fn record_navigation(
    State(state): State<AppState>,
    Json(req): Json<NavigationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state
        .engine
        .record_navigation(req.from, req.to, req.trigger, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn start_bulk(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.start_bulk(Utc::now()).await?))
}

async fn pause_bulk(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.pause_bulk().await?))
}

async fn resume_bulk(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.resume_bulk().await?))
}

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub tab_handle: TabHandle,
    #[serde(default)]
    pub priority: Priority,
}

async fn enqueue_incremental(
    State(state): State<AppState>,
    Json(req): Json<EnqueueRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let queued = state
        .engine
        .enqueue_incremental(req.tab_handle, req.priority)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "queued": queued }))))
}

async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.stats().await?))
}

async fn maintenance(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.run_maintenance(Utc::now()).await?))
}
