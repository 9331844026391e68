//! HTTP surface: application state, router construction, and handlers.
//!
//! Authentication and authorization live in front of this service; the
//! `x-actor-id` header carries the principal injected by that layer, and
//! `x-preview-mode` marks privileged reads.

mod articles;
mod properties;
mod schedule;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::middleware as axum_mw;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::idempotency;
use crate::scheduler::SchedulerService;
use crate::services::{EntityServices, MutationOptions};
use crate::store::Stores;
use crate::workflow::WorkflowState;

/// Preview reads are flagged with this header by the auth layer.
pub const PREVIEW_HEADER: &str = "x-preview-mode";

/// Principal injected by the auth layer.
pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub services: Arc<EntityServices>,
    pub scheduler: Arc<SchedulerService>,
    pub idempotency_ttl: chrono::Duration,
}

/// Build the full axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/v1/properties",
            get(properties::list).post(properties::create),
        )
        .route(
            "/v1/properties/:id",
            get(properties::get)
                .put(properties::update)
                .delete(properties::soft_delete),
        )
        .route("/v1/properties/:id/transition", post(properties::transition))
        .route("/v1/properties/:id/restore", post(properties::restore))
        .route("/v1/articles", get(articles::list).post(articles::create))
        .route(
            "/v1/articles/:id",
            get(articles::get)
                .put(articles::update)
                .delete(articles::soft_delete),
        )
        .route("/v1/articles/:id/transition", post(articles::transition))
        .route("/v1/articles/:id/restore", post(articles::restore))
        .route("/v1/articles/slug/:slug", get(articles::get_by_slug))
        .route("/v1/schedule", post(schedule::create))
        .route("/v1/schedule/jobs", get(schedule::list_jobs))
        .layer(axum_mw::from_fn_with_state(state.clone(), idempotency::guard))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Shared body for workflow transition endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransitionRequest {
    pub target: WorkflowState,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Wrapper for list responses.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

pub(crate) fn actor_from(headers: &HeaderMap) -> String {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

pub(crate) fn preview_from(headers: &HeaderMap) -> bool {
    headers
        .get(PREVIEW_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            normalized == "1" || normalized == "true" || normalized == "yes"
        })
        .unwrap_or(false)
}

pub(crate) fn mutation_options(headers: &HeaderMap) -> MutationOptions {
    MutationOptions {
        skip_index_rebuild: false,
        ip_address: headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
    }
}
