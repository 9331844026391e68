//! Publication workflow state machine.
//!
//! The machine does not forbid moves: transitions are requested explicitly
//! by an operator (or by an applied change-set) and this module's job is to
//! compute the side-effect timestamp fields for the requested target. It is
//! a pure function of the entity's workflow fields, the target, and the
//! clock value passed in; no entity reference is retained between calls.
//!
//! Both entity kinds (`Property`, `Article`) expose their workflow fields
//! through the [`Publishable`] capability trait, so the transition logic
//! exists exactly once.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CmsError, CmsResult};

/// How long a soft-deleted entity can still be restored.
pub fn retention_window() -> Duration {
    Duration::days(30)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Draft,
    Review,
    Scheduled,
    Published,
    Hidden,
    Archived,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Review => "REVIEW",
            Self::Scheduled => "SCHEDULED",
            Self::Published => "PUBLISHED",
            Self::Hidden => "HIDDEN",
            Self::Archived => "ARCHIVED",
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow field access shared by every publishable entity kind.
pub trait Publishable {
    fn workflow_state(&self) -> WorkflowState;
    fn set_workflow_state(&mut self, state: WorkflowState);

    fn workflow_changed_at(&self) -> DateTime<Utc>;
    fn set_workflow_changed_at(&mut self, at: DateTime<Utc>);

    fn published_at(&self) -> Option<DateTime<Utc>>;
    fn set_published_at(&mut self, at: Option<DateTime<Utc>>);

    fn scheduled_at(&self) -> Option<DateTime<Utc>>;
    fn set_scheduled_at(&mut self, at: Option<DateTime<Utc>>);

    fn hidden_at(&self) -> Option<DateTime<Utc>>;
    fn set_hidden_at(&mut self, at: Option<DateTime<Utc>>);

    fn deleted_at(&self) -> Option<DateTime<Utc>>;
    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>);
}

/// Implements [`Publishable`] for a struct carrying the standard workflow
/// field names.
macro_rules! impl_publishable {
    ($ty:ty) => {
        impl $crate::workflow::Publishable for $ty {
            fn workflow_state(&self) -> $crate::workflow::WorkflowState {
                self.workflow_state
            }
            fn set_workflow_state(&mut self, state: $crate::workflow::WorkflowState) {
                self.workflow_state = state;
            }
            fn workflow_changed_at(&self) -> chrono::DateTime<chrono::Utc> {
                self.workflow_changed_at
            }
            fn set_workflow_changed_at(&mut self, at: chrono::DateTime<chrono::Utc>) {
                self.workflow_changed_at = at;
            }
            fn published_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
                self.published_at
            }
            fn set_published_at(&mut self, at: Option<chrono::DateTime<chrono::Utc>>) {
                self.published_at = at;
            }
            fn scheduled_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
                self.scheduled_at
            }
            fn set_scheduled_at(&mut self, at: Option<chrono::DateTime<chrono::Utc>>) {
                self.scheduled_at = at;
            }
            fn hidden_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
                self.hidden_at
            }
            fn set_hidden_at(&mut self, at: Option<chrono::DateTime<chrono::Utc>>) {
                self.hidden_at = at;
            }
            fn deleted_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
                self.deleted_at
            }
            fn set_deleted_at(&mut self, at: Option<chrono::DateTime<chrono::Utc>>) {
                self.deleted_at = at;
            }
        }
    };
}
pub(crate) use impl_publishable;

/// Apply a requested transition, computing the side-effect fields.
///
/// `Scheduled` requires a `scheduled_at` parameter and is the only way a
/// transition fails. Hiding retains an earlier `published_at` so the
/// original publication instant survives a hide/unhide cycle.
pub fn transition<P: Publishable>(
    entity: &mut P,
    target: WorkflowState,
    now: DateTime<Utc>,
    scheduled_at: Option<DateTime<Utc>>,
) -> CmsResult<()> {
    match target {
        WorkflowState::Published => {
            entity.set_published_at(Some(now));
            entity.set_scheduled_at(None);
            entity.set_hidden_at(None);
        }
        WorkflowState::Scheduled => {
            let at = scheduled_at.ok_or_else(|| {
                CmsError::Validation("scheduledAt is required for the SCHEDULED state".into())
            })?;
            entity.set_scheduled_at(Some(at));
            entity.set_hidden_at(None);
            entity.set_published_at(None);
        }
        WorkflowState::Hidden => {
            entity.set_hidden_at(Some(now));
            entity.set_scheduled_at(None);
        }
        WorkflowState::Draft | WorkflowState::Review | WorkflowState::Archived => {
            entity.set_scheduled_at(None);
            entity.set_hidden_at(None);
            entity.set_published_at(None);
        }
    }

    entity.set_workflow_state(target);
    entity.set_workflow_changed_at(now);
    Ok(())
}

/// Soft delete: stamp `deleted_at` and force the `Hidden` side effects.
/// Soft deletion is not itself a workflow state.
pub fn soft_delete<P: Publishable>(entity: &mut P, now: DateTime<Utc>) {
    entity.set_deleted_at(Some(now));
    entity.set_workflow_state(WorkflowState::Hidden);
    entity.set_workflow_changed_at(now);
    entity.set_hidden_at(Some(now));
    entity.set_scheduled_at(None);
}

/// Restore a soft-deleted entity back to `Draft`.
///
/// Fails with `NotFound` when the entity was never deleted and with `Gone`
/// once the retention window has elapsed.
pub fn restore<P: Publishable>(entity: &mut P, now: DateTime<Utc>) -> CmsResult<()> {
    let deleted_at = entity
        .deleted_at()
        .ok_or_else(|| CmsError::NotFound("entity is not deleted".into()))?;

    if now - deleted_at > retention_window() {
        return Err(CmsError::Gone("restore window has elapsed".into()));
    }

    entity.set_deleted_at(None);
    transition(entity, WorkflowState::Draft, now, None)
}

/// Visibility for non-privileged reads.
pub fn is_publicly_visible<P: Publishable>(entity: &P) -> bool {
    entity.workflow_state() == WorkflowState::Published && entity.deleted_at().is_none()
}

/// Visibility for privileged/preview reads: everything live, plus
/// soft-deleted entities still within the retention window.
pub fn is_preview_visible<P: Publishable>(entity: &P, now: DateTime<Utc>) -> bool {
    match entity.deleted_at() {
        None => true,
        Some(deleted_at) => now - deleted_at <= retention_window(),
    }
}
