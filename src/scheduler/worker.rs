//! Background worker applying due publish jobs.
//!
//! One timer, no worker pool: jobs are applied sequentially per tick so
//! audit ordering stays deterministic and two jobs in the same tick cannot
//! contend on one entity. A tick already in progress suppresses overlapping
//! ticks via an atomic flag rather than queuing them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::audit::{actions, AuditEvent};
use crate::entities::Property;
use crate::error::CmsResult;
use crate::index::{rebuild_safe, SearchIndex};
use crate::services::EntityServices;
use crate::store::Stores;

pub struct SchedulerWorker {
    stores: Stores,
    services: Arc<EntityServices>,
    index: Arc<dyn SearchIndex>,
    interval: Duration,
    batch_size: usize,
    ticking: AtomicBool,
}

impl SchedulerWorker {
    pub fn new(
        stores: Stores,
        services: Arc<EntityServices>,
        index: Arc<dyn SearchIndex>,
        interval: Duration,
        batch_size: usize,
    ) -> Self {
        Self {
            stores,
            services,
            index,
            interval,
            batch_size,
            ticking: AtomicBool::new(false),
        }
    }

    /// Run the tick loop until the shutdown signal flips. The first tick
    /// fires immediately so due work is not delayed by one full interval on
    /// startup.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        info!("scheduler worker started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }

        info!("scheduler worker stopped");
    }

    /// One scheduling pass: release expired reservations, then apply due
    /// jobs. Phase 2 runs even when phase 1 fails.
    pub async fn tick(&self) {
        if self.ticking.swap(true, Ordering::SeqCst) {
            debug!("tick already in progress, skipping");
            return;
        }

        if let Err(error) = self.release_expired_reservations().await {
            warn!(error = %error, "reservation release phase failed");
        }
        self.process_due_jobs().await;

        self.ticking.store(false, Ordering::SeqCst);
    }

    async fn release_expired_reservations(&self) -> CmsResult<()> {
        let now = Utc::now();
        let released = self
            .stores
            .properties
            .release_expired_reservations(now, &|property: &Property| {
                AuditEvent::new(
                    actions::PROPERTY_RESERVATION_RELEASE,
                    "Property",
                    property.id,
                )
                .meta(json!({ "slug": property.slug, "reason": "reservation expired" }))
            })
            .await?;

        if !released.is_empty() {
            info!(released = released.len(), "released expired property reservations");
            rebuild_safe(self.index.as_ref()).await;
        }
        Ok(())
    }

    async fn process_due_jobs(&self) {
        let due = match self.stores.schedules.due_jobs(Utc::now(), self.batch_size).await {
            Ok(due) => due,
            Err(error) => {
                warn!(error = %error, "failed to fetch due publish jobs");
                return;
            }
        };

        if due.is_empty() {
            return;
        }
        debug!(count = due.len(), "processing due publish jobs");

        let mut applied = 0usize;
        for entry in due {
            let job_id = entry.job.id;

            if let Err(error) = self.stores.schedules.begin_job(job_id).await {
                warn!(job_id = %job_id, error = %error, "could not claim publish job");
                continue;
            }

            match self.services.apply_change_set(&entry.change_set).await {
                Ok(()) => {
                    applied += 1;
                    if let Err(error) = self
                        .stores
                        .schedules
                        .complete_job(job_id, "Applied successfully")
                        .await
                    {
                        error!(job_id = %job_id, error = %error, "failed to mark job success");
                    }
                }
                Err(error) => {
                    error!(job_id = %job_id, error = %error, "failed to apply scheduled change");
                    // Best-effort: losing the failure record must not kill
                    // the remaining jobs in this tick.
                    if let Err(store_error) = self
                        .stores
                        .schedules
                        .fail_job(job_id, &error.to_string())
                        .await
                    {
                        error!(
                            job_id = %job_id,
                            error = %store_error,
                            "failed to record job failure"
                        );
                    }
                }
            }
        }

        if applied > 0 {
            rebuild_safe(self.index.as_ref()).await;
        }
    }
}
