//! Article endpoints.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::entities::{Article, ArticleCreate, ArticlePatch};
use crate::error::CmsResult;

use super::{actor_from, mutation_options, preview_from, AppState, ListResponse, TransitionRequest};

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> CmsResult<Json<ListResponse<Article>>> {
    let data = state.services.articles.list(preview_from(&headers)).await?;
    Ok(Json(ListResponse { data }))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> CmsResult<Json<Article>> {
    let article = state
        .services
        .articles
        .get(id, preview_from(&headers))
        .await?;
    Ok(Json(article))
}

pub async fn get_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> CmsResult<Json<Article>> {
    let article = state
        .services
        .articles
        .get_by_slug(&slug, preview_from(&headers))
        .await?;
    Ok(Json(article))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<ArticleCreate>,
) -> CmsResult<(StatusCode, Json<Article>)> {
    let created = state
        .services
        .articles
        .create(input, &actor_from(&headers), mutation_options(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(patch): Json<ArticlePatch>,
) -> CmsResult<Json<Article>> {
    let updated = state
        .services
        .articles
        .update(id, patch, &actor_from(&headers), mutation_options(&headers))
        .await?;
    Ok(Json(updated))
}

pub async fn transition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<TransitionRequest>,
) -> CmsResult<Json<Article>> {
    let updated = state
        .services
        .articles
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
        .articles
        .soft_delete(id, &actor_from(&headers), mutation_options(&headers))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> CmsResult<Json<Article>> {
    let restored = state
        .services
        .articles
        .restore(id, &actor_from(&headers), mutation_options(&headers))
        .await?;
    Ok(Json(restored))
}
