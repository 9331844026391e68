//! Deferred-mutation endpoints (privileged).

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{CmsError, CmsResult};
use crate::scheduler::{ChangeSet, JobStatus, PublishJob, ScheduleRequest, ScheduledJob};

use super::{actor_from, mutation_options, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub change_set: ChangeSet,
    pub job: PublishJob,
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ScheduleRequest>,
) -> CmsResult<(StatusCode, Json<ScheduleResponse>)> {
    let ip_address = mutation_options(&headers).ip_address;
    let (change_set, job) = state
        .scheduler
        .create_schedule(request, &actor_from(&headers), ip_address)
        .await?;
    Ok((StatusCode::CREATED, Json(ScheduleResponse { change_set, job })))
}

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<ScheduledJob>,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobsQuery>,
) -> CmsResult<Json<JobsResponse>> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(JobStatus::parse(raw).ok_or_else(|| {
            CmsError::Validation(format!("unknown job status: {raw}"))
        })?),
    };
    let jobs = state
        .scheduler
        .list_jobs(status, query.limit.unwrap_or(20))
        .await?;
    Ok(Json(JobsResponse { jobs }))
}
