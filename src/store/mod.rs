//! Storage port traits.
//!
//! Core logic depends only on these traits; the persistent store's query
//! language stays behind them. Each method is one atomic operation — the
//! closure-taking mutation ops are the transaction boundary: load, apply
//! the closure, persist, write the returned audit event, commit. Paired
//! job/change-set status moves are single methods so the two records can
//! never diverge.

mod memory;

pub use memory::MemoryStores;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::entities::{Article, Property};
use crate::error::CmsResult;
use crate::idempotency::IdempotencyRecord;
use crate::scheduler::{ChangeSet, JobStatus, PublishJob, ScheduledJob};

/// Mutation closure run inside the store's transaction. Returns the audit
/// event persisted with the change; an `Err` abandons the whole operation.
pub type MutateFn<T> = Box<dyn FnOnce(&mut T) -> CmsResult<AuditEvent> + Send>;

/// Outcome of attempting to create an in-flight idempotency record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// An unexpired record for the same (key, method, path) already exists.
    /// The uniqueness constraint is the only synchronization primitive the
    /// idempotency pipeline relies on.
    AlreadyExists,
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn find(
        &self,
        key: &str,
        method: &str,
        path: &str,
    ) -> CmsResult<Option<IdempotencyRecord>>;

    /// Create an in-flight record. An expired record under the same triple
    /// is replaced; an unexpired one reports [`InsertOutcome::AlreadyExists`].
    async fn create_in_flight(&self, record: IdempotencyRecord) -> CmsResult<InsertOutcome>;

    /// Finalize with the handler's terminal response, refreshing the TTL.
    async fn finalize(
        &self,
        key: &str,
        method: &str,
        path: &str,
        status: u16,
        response_body: Option<String>,
        response_hash: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> CmsResult<()>;

    async fn delete(&self, key: &str, method: &str, path: &str) -> CmsResult<()>;

    /// Prune expired records; returns how many were removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> CmsResult<u64>;
}

#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn insert(&self, property: Property, audit: AuditEvent) -> CmsResult<Property>;

    async fn get(&self, id: Uuid) -> CmsResult<Option<Property>>;

    /// Every row, newest first. Visibility filtering is service logic.
    async fn list(&self) -> CmsResult<Vec<Property>>;

    async fn update_with(&self, id: Uuid, mutate: MutateFn<Property>) -> CmsResult<Property>;

    /// Revert expired no-deposit reservations to available, one audit event
    /// per release, all in a single atomic batch. Returns the released rows.
    async fn release_expired_reservations(
        &self,
        now: DateTime<Utc>,
        audit: &(dyn for<'a> Fn(&'a Property) -> AuditEvent + Send + Sync),
    ) -> CmsResult<Vec<Property>>;
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn insert(&self, article: Article, audit: AuditEvent) -> CmsResult<Article>;

    async fn get(&self, id: Uuid) -> CmsResult<Option<Article>>;

    async fn find_by_slug(&self, slug: &str) -> CmsResult<Option<Article>>;

    async fn list(&self) -> CmsResult<Vec<Article>>;

    async fn update_with(&self, id: Uuid, mutate: MutateFn<Article>) -> CmsResult<Article>;
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Create a change-set and its owning job together, with the audit
    /// event, in one atomic operation.
    async fn create_schedule(
        &self,
        change_set: ChangeSet,
        job: PublishJob,
        audit: AuditEvent,
    ) -> CmsResult<(ChangeSet, PublishJob)>;

    /// Queued jobs due at `now`, oldest `run_at` first, with their
    /// change-sets.
    async fn due_jobs(&self, now: DateTime<Utc>, limit: usize) -> CmsResult<Vec<ScheduledJob>>;

    /// Atomically move job `queued → running` and change-set
    /// `pending → processing`.
    async fn begin_job(&self, job_id: Uuid) -> CmsResult<()>;

    /// Atomically move job `running → success` and change-set
    /// `processing → applied`.
    async fn complete_job(&self, job_id: Uuid, log: &str) -> CmsResult<()>;

    /// Atomically move job `running → failed` and change-set
    /// `processing → failed`, capturing the error detail.
    async fn fail_job(&self, job_id: Uuid, log: &str) -> CmsResult<()>;

    /// Jobs newest `run_at` first, optionally filtered by status.
    async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> CmsResult<Vec<ScheduledJob>>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Record an event outside any other atomic operation.
    async fn record(&self, event: AuditEvent) -> CmsResult<()>;

    /// Most recent events, oldest first within the returned window.
    async fn recent(&self, limit: usize) -> CmsResult<Vec<AuditEvent>>;
}

/// Bundle of store handles shared across services; cheap to clone.
#[derive(Clone)]
pub struct Stores {
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub properties: Arc<dyn PropertyStore>,
    pub articles: Arc<dyn ArticleStore>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub audit: Arc<dyn AuditStore>,
}

impl Stores {
    /// Wire every port to a single shared in-memory store.
    pub fn in_memory() -> (Self, Arc<MemoryStores>) {
        let memory = Arc::new(MemoryStores::default());
        let stores = Self {
            idempotency: memory.clone(),
            properties: memory.clone(),
            articles: memory.clone(),
            schedules: memory.clone(),
            audit: memory.clone(),
        };
        (stores, memory)
    }
}
