//! In-memory store implementing every storage port.
//!
//! One mutex over the whole dataset makes each port method atomic, which is
//! exactly the transaction guarantee the ports promise. Uniqueness of the
//! idempotency triple is enforced here, mirroring the unique index a
//! database-backed store would rely on.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::entities::{Article, Property, PropertyStatus};
use crate::error::{CmsError, CmsResult};
use crate::idempotency::IdempotencyRecord;
use crate::scheduler::{ChangeSet, ChangeSetStatus, JobStatus, PublishJob, ScheduledJob};

use super::{
    ArticleStore, AuditStore, IdempotencyStore, InsertOutcome, MutateFn, PropertyStore,
    ScheduleStore,
};

type IdempotencyKey = (String, String, String);

#[derive(Default)]
struct MemoryInner {
    idempotency: HashMap<IdempotencyKey, IdempotencyRecord>,
    properties: HashMap<Uuid, Property>,
    articles: HashMap<Uuid, Article>,
    change_sets: HashMap<Uuid, ChangeSet>,
    jobs: HashMap<Uuid, PublishJob>,
    audit_log: Vec<AuditEvent>,
}

#[derive(Default)]
pub struct MemoryStores {
    inner: Mutex<MemoryInner>,
}

impl MemoryStores {
    fn lock(&self) -> CmsResult<MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| CmsError::Internal(anyhow!("store mutex poisoned")))
    }

    /// Overwrite a record's expiry. Test hook for exercising TTL behavior
    /// without waiting out the clock.
    pub fn set_idempotency_expiry(
        &self,
        key: &str,
        method: &str,
        path: &str,
        expires_at: DateTime<Utc>,
    ) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        let triple = (key.to_string(), method.to_string(), path.to_string());
        match inner.idempotency.get_mut(&triple) {
            Some(record) => {
                record.expires_at = expires_at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl IdempotencyStore for MemoryStores {
    async fn find(
        &self,
        key: &str,
        method: &str,
        path: &str,
    ) -> CmsResult<Option<IdempotencyRecord>> {
        let inner = self.lock()?;
        let triple = (key.to_string(), method.to_string(), path.to_string());
        Ok(inner.idempotency.get(&triple).cloned())
    }

    async fn create_in_flight(&self, record: IdempotencyRecord) -> CmsResult<InsertOutcome> {
        let mut inner = self.lock()?;
        let triple = (
            record.key.clone(),
            record.method.clone(),
            record.path.clone(),
        );
        if let Some(existing) = inner.idempotency.get(&triple) {
            if !existing.is_expired(Utc::now()) {
                return Ok(InsertOutcome::AlreadyExists);
            }
        }
        inner.idempotency.insert(triple, record);
        Ok(InsertOutcome::Created)
    }

    async fn finalize(
        &self,
        key: &str,
        method: &str,
        path: &str,
        status: u16,
        response_body: Option<String>,
        response_hash: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> CmsResult<()> {
        let mut inner = self.lock()?;
        let triple = (key.to_string(), method.to_string(), path.to_string());
        match inner.idempotency.get_mut(&triple) {
            Some(record) => {
                record.status = Some(status);
                record.response_body = response_body;
                record.response_hash = response_hash;
                record.expires_at = expires_at;
                Ok(())
            }
            None => {
                warn!(key, method, path, "idempotency record vanished before finalize");
                Ok(())
            }
        }
    }

    async fn delete(&self, key: &str, method: &str, path: &str) -> CmsResult<()> {
        let mut inner = self.lock()?;
        let triple = (key.to_string(), method.to_string(), path.to_string());
        inner.idempotency.remove(&triple);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> CmsResult<u64> {
        let mut inner = self.lock()?;
        let before = inner.idempotency.len();
        inner.idempotency.retain(|_, record| !record.is_expired(now));
        Ok((before - inner.idempotency.len()) as u64)
    }
}

#[async_trait]
impl PropertyStore for MemoryStores {
    async fn insert(&self, property: Property, audit: AuditEvent) -> CmsResult<Property> {
        let mut inner = self.lock()?;
        if inner.properties.values().any(|p| p.slug == property.slug) {
            return Err(CmsError::Conflict(format!(
                "property slug already exists: {}",
                property.slug
            )));
        }
        inner.properties.insert(property.id, property.clone());
        inner.audit_log.push(audit);
        Ok(property)
    }

    async fn get(&self, id: Uuid) -> CmsResult<Option<Property>> {
        Ok(self.lock()?.properties.get(&id).cloned())
    }

    async fn list(&self) -> CmsResult<Vec<Property>> {
        let inner = self.lock()?;
        let mut rows: Vec<Property> = inner.properties.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn update_with(&self, id: Uuid, mutate: MutateFn<Property>) -> CmsResult<Property> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let mut updated = inner
            .properties
            .get(&id)
            .cloned()
            .ok_or_else(|| CmsError::NotFound(format!("property not found: {id}")))?;
        let audit = mutate(&mut updated)?;
        inner.properties.insert(id, updated.clone());
        inner.audit_log.push(audit);
        Ok(updated)
    }

    async fn release_expired_reservations(
        &self,
        now: DateTime<Utc>,
        audit: &(dyn for<'a> Fn(&'a Property) -> AuditEvent + Send + Sync),
    ) -> CmsResult<Vec<Property>> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let expired: Vec<Uuid> = inner
            .properties
            .values()
            .filter(|p| {
                p.status == PropertyStatus::Reserved
                    && !p.deposit
                    && p.reserved_until.is_some_and(|until| until < now)
            })
            .map(|p| p.id)
            .collect();

        let mut released = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(property) = inner.properties.get_mut(&id) {
                property.status = PropertyStatus::Available;
                property.reserved_until = None;
                property.updated_at = now;
                let event = audit(property);
                released.push(property.clone());
                inner.audit_log.push(event);
            }
        }
        Ok(released)
    }
}

#[async_trait]
impl ArticleStore for MemoryStores {
    async fn insert(&self, article: Article, audit: AuditEvent) -> CmsResult<Article> {
        let mut inner = self.lock()?;
        if inner.articles.values().any(|a| a.slug == article.slug) {
            return Err(CmsError::Conflict(format!(
                "article slug already exists: {}",
                article.slug
            )));
        }
        inner.articles.insert(article.id, article.clone());
        inner.audit_log.push(audit);
        Ok(article)
    }

    async fn get(&self, id: Uuid) -> CmsResult<Option<Article>> {
        Ok(self.lock()?.articles.get(&id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> CmsResult<Option<Article>> {
        let inner = self.lock()?;
        Ok(inner.articles.values().find(|a| a.slug == slug).cloned())
    }

    async fn list(&self) -> CmsResult<Vec<Article>> {
        let inner = self.lock()?;
        let mut rows: Vec<Article> = inner.articles.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn update_with(&self, id: Uuid, mutate: MutateFn<Article>) -> CmsResult<Article> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let mut updated = inner
            .articles
            .get(&id)
            .cloned()
            .ok_or_else(|| CmsError::NotFound(format!("article not found: {id}")))?;
        let audit = mutate(&mut updated)?;
        inner.articles.insert(id, updated.clone());
        inner.audit_log.push(audit);
        Ok(updated)
    }
}

#[async_trait]
impl ScheduleStore for MemoryStores {
    async fn create_schedule(
        &self,
        change_set: ChangeSet,
        job: PublishJob,
        audit: AuditEvent,
    ) -> CmsResult<(ChangeSet, PublishJob)> {
        let mut inner = self.lock()?;
        inner.change_sets.insert(change_set.id, change_set.clone());
        inner.jobs.insert(job.id, job.clone());
        inner.audit_log.push(audit);
        Ok((change_set, job))
    }

    async fn due_jobs(&self, now: DateTime<Utc>, limit: usize) -> CmsResult<Vec<ScheduledJob>> {
        let inner = self.lock()?;
        let mut due: Vec<&PublishJob> = inner
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Queued && job.run_at <= now)
            .collect();
        due.sort_by(|a, b| a.run_at.cmp(&b.run_at).then(a.created_at.cmp(&b.created_at)));

        let mut result = Vec::new();
        for job in due.into_iter().take(limit) {
            match inner.change_sets.get(&job.change_set_id) {
                Some(change_set) => result.push(ScheduledJob {
                    job: job.clone(),
                    change_set: change_set.clone(),
                }),
                None => warn!(job_id = %job.id, "job references a missing change-set"),
            }
        }
        Ok(result)
    }

    async fn begin_job(&self, job_id: Uuid) -> CmsResult<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| CmsError::NotFound(format!("publish job not found: {job_id}")))?;
        if job.status != JobStatus::Queued {
            return Err(CmsError::Conflict(format!(
                "publish job {job_id} is not queued"
            )));
        }
        job.status = JobStatus::Running;
        let change_set_id = job.change_set_id;
        let change_set = inner
            .change_sets
            .get_mut(&change_set_id)
            .ok_or_else(|| CmsError::Internal(anyhow!("change-set missing: {change_set_id}")))?;
        change_set.status = ChangeSetStatus::Processing;
        Ok(())
    }

    async fn complete_job(&self, job_id: Uuid, log: &str) -> CmsResult<()> {
        self.settle_job(job_id, JobStatus::Success, ChangeSetStatus::Applied, log)
    }

    async fn fail_job(&self, job_id: Uuid, log: &str) -> CmsResult<()> {
        self.settle_job(job_id, JobStatus::Failed, ChangeSetStatus::Failed, log)
    }

    async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> CmsResult<Vec<ScheduledJob>> {
        let inner = self.lock()?;
        let mut jobs: Vec<&PublishJob> = inner
            .jobs
            .values()
            .filter(|job| status.map_or(true, |wanted| job.status == wanted))
            .collect();
        jobs.sort_by(|a, b| b.run_at.cmp(&a.run_at).then(b.created_at.cmp(&a.created_at)));

        let mut result = Vec::new();
        for job in jobs.into_iter().take(limit) {
            if let Some(change_set) = inner.change_sets.get(&job.change_set_id) {
                result.push(ScheduledJob {
                    job: job.clone(),
                    change_set: change_set.clone(),
                });
            }
        }
        Ok(result)
    }
}

impl MemoryStores {
    fn settle_job(
        &self,
        job_id: Uuid,
        job_status: JobStatus,
        change_set_status: ChangeSetStatus,
        log: &str,
    ) -> CmsResult<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| CmsError::NotFound(format!("publish job not found: {job_id}")))?;
        if matches!(job.status, JobStatus::Success | JobStatus::Failed) {
            return Err(CmsError::Conflict(format!(
                "publish job {job_id} already settled"
            )));
        }
        job.status = job_status;
        job.log = Some(log.to_string());
        let change_set_id = job.change_set_id;
        let change_set = inner
            .change_sets
            .get_mut(&change_set_id)
            .ok_or_else(|| CmsError::Internal(anyhow!("change-set missing: {change_set_id}")))?;
        change_set.status = change_set_status;
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryStores {
    async fn record(&self, event: AuditEvent) -> CmsResult<()> {
        self.lock()?.audit_log.push(event);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> CmsResult<Vec<AuditEvent>> {
        let inner = self.lock()?;
        let start = inner.audit_log.len().saturating_sub(limit);
        Ok(inner.audit_log[start..].to_vec())
    }
}
