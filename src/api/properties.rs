//! Property endpoints.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::entities::{Property, PropertyCreate, PropertyPatch};
use crate::error::CmsResult;

use super::{actor_from, mutation_options, preview_from, AppState, ListResponse, TransitionRequest};

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> CmsResult<Json<ListResponse<Property>>> {
    let data = state
        .services
        .properties
        .list(preview_from(&headers))
        .await?;
    Ok(Json(ListResponse { data }))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> CmsResult<Json<Property>> {
    let property = state
        .services
        .properties
        .get(id, preview_from(&headers))
        .await?;
    Ok(Json(property))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<PropertyCreate>,
) -> CmsResult<(StatusCode, Json<Property>)> {
    let created = state
        .services
        .properties
        .create(input, &actor_from(&headers), mutation_options(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(patch): Json<PropertyPatch>,
) -> CmsResult<Json<Property>> {
    let updated = state
        .services
        .properties
        .update(id, patch, &actor_from(&headers), mutation_options(&headers))
        .await?;
    Ok(Json(updated))
}

pub async fn transition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<TransitionRequest>,
) -> CmsResult<Json<Property>> {
    let updated = state
        .services
        .properties
        .transition_state(
            id,
            request.target,
            request.scheduled_at,
            &actor_from(&headers),
            mutation_options(&headers),
        )
        .await?;
    Ok(Json(updated))
}

pub async fn soft_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> CmsResult<StatusCode> {
    state
        .services
        .properties
        .soft_delete(id, &actor_from(&headers), mutation_options(&headers))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> CmsResult<Json<Property>> {
    let restored = state
        .services
        .properties
        .restore(id, &actor_from(&headers), mutation_options(&headers))
        .await?;
    Ok(Json(restored))
}
