//! Deferred-mutation scheduling: change-sets, publish jobs, the service
//! that stages them, and the worker that applies them on a fixed interval.

mod service;
mod worker;

pub use service::{ScheduleRequest, SchedulerService};
pub use worker::SchedulerWorker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::entities::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSetStatus {
    Pending,
    Processing,
    Applied,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A staged, validated patch awaiting deferred application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    pub id: Uuid,
    pub entity_type: EntityKind,
    pub entity_id: Uuid,
    pub patch: Value,
    pub status: ChangeSetStatus,
    pub schedule_at: DateTime<Utc>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Queued execution of exactly one change-set. `change_set_id` is set at
/// creation and never reassigned; a job never re-enters `queued`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishJob {
    pub id: Uuid,
    pub change_set_id: Uuid,
    pub run_at: DateTime<Utc>,
    pub status: JobStatus,
    pub log: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A job with its change-set embedded, as returned by the listing endpoint
/// and consumed by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJob {
    #[serde(flatten)]
    pub job: PublishJob,
    pub change_set: ChangeSet,
}
