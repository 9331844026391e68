//! Audit trail events.
//!
//! Events are written by the stores inside the same atomic operation as the
//! mutation they describe; a failed audit write is logged by the store and
//! never aborts the mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Dotted action names recorded on audit events.
pub mod actions {
    pub const PROPERTY_CREATE: &str = "property.create";
    pub const PROPERTY_UPDATE: &str = "property.update";
    pub const PROPERTY_TRANSITION: &str = "property.workflow.transition";
    pub const PROPERTY_SOFT_DELETE: &str = "property.softDelete";
    pub const PROPERTY_RESTORE: &str = "property.restore";
    pub const PROPERTY_RESERVATION_RELEASE: &str = "property.reservation.release";
    pub const ARTICLE_CREATE: &str = "article.create";
    pub const ARTICLE_UPDATE: &str = "article.update";
    pub const ARTICLE_TRANSITION: &str = "article.workflow.transition";
    pub const ARTICLE_SOFT_DELETE: &str = "article.softDelete";
    pub const ARTICLE_RESTORE: &str = "article.restore";
    pub const SCHEDULE_CREATE: &str = "schedule.create";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// `None` for system-initiated actions (e.g. reservation release).
    pub actor_id: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub meta: Option<Value>,
    pub ip_address: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: &str, entity_type: &str, entity_id: Uuid) -> Self {
        Self {
            actor_id: None,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: Some(entity_id),
            meta: None,
            ip_address: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn actor(mut self, actor_id: &str) -> Self {
        self.actor_id = Some(actor_id.to_string());
        self
    }

    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }
}
