//! Staging and inspection of deferred mutations.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit::{actions, AuditEvent};
use crate::entities::EntityKind;
use crate::error::CmsResult;
use crate::services::EntityServices;
use crate::store::Stores;

use super::{ChangeSet, ChangeSetStatus, JobStatus, PublishJob, ScheduledJob};

/// Listing endpoint cap.
pub const MAX_JOB_LIST_LIMIT: usize = 100;

/// `entity_type` arrives as a raw string so an unknown kind surfaces as
/// `UNSUPPORTED_ENTITY_TYPE` rather than a generic deserialization error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScheduleRequest {
    pub entity_type: String,
    pub entity_id: Uuid,
    pub patch: Value,
    #[serde(default)]
    pub run_at: Option<DateTime<Utc>>,
}

pub struct SchedulerService {
    stores: Stores,
}

impl SchedulerService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Stage a patch for deferred application.
    ///
    /// The patch is validated against the same schema the direct update
    /// endpoint uses, so the queue can never hold a payload the entity
    /// service would reject. A missing `run_at` means "next tick" — due
    /// jobs are never applied synchronously.
    pub async fn create_schedule(
        &self,
        request: ScheduleRequest,
        actor: &str,
        ip_address: Option<String>,
    ) -> CmsResult<(ChangeSet, PublishJob)> {
        let kind = EntityKind::parse(&request.entity_type)?;
        let patch = EntityServices::validate_patch(kind, &request.patch)?;
        let now = Utc::now();
        let run_at = request.run_at.unwrap_or(now);

        let change_set = ChangeSet {
            id: Uuid::new_v4(),
            entity_type: kind,
            entity_id: request.entity_id,
            patch,
            status: ChangeSetStatus::Pending,
            schedule_at: run_at,
            created_by: actor.to_string(),
            created_at: now,
        };
        let job = PublishJob {
            id: Uuid::new_v4(),
            change_set_id: change_set.id,
            run_at,
            status: JobStatus::Queued,
            log: None,
            created_at: now,
        };
        let audit = AuditEvent::new(
            actions::SCHEDULE_CREATE,
            kind.audit_label(),
            request.entity_id,
        )
        .actor(actor)
        .meta(json!({ "changeSetId": change_set.id, "runAt": run_at }))
        .ip(ip_address);

        self.stores
            .schedules
            .create_schedule(change_set, job, audit)
            .await
    }

    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> CmsResult<Vec<ScheduledJob>> {
        let limit = limit.clamp(1, MAX_JOB_LIST_LIMIT);
        self.stores.schedules.list_jobs(status, limit).await
    }
}
