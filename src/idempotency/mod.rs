//! Idempotent-execution pipeline: durable request ledger, the axum guard
//! that consults it, and the background sweeper that prunes expired records.

mod middleware;
mod sweeper;

pub use middleware::guard;
pub use sweeper::IdempotencySweeper;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header carrying the client-supplied retry token. Absence disables the
/// guard for that call.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// One entry in the idempotency ledger, unique per unexpired
/// (key, method, path) triple.
///
/// A record is created in-flight (`status` empty) when a guarded request
/// first arrives, finalized once the handler completes with a 2xx/3xx, and
/// deleted when the handler fails so the key becomes retryable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    pub key: String,
    pub method: String,
    pub path: String,
    /// Canonical hash of the request body; `None` for bodyless requests.
    pub request_body_hash: Option<String>,
    /// Canonical snapshot of the request body, kept for diagnostics.
    pub request_body: Option<Value>,
    /// HTTP status once finalized; `None` while the first attempt is still
    /// in flight.
    pub status: Option<u16>,
    /// Verbatim response bytes, replayed byte-for-byte on retries.
    pub response_body: Option<String>,
    pub response_hash: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl IdempotencyRecord {
    /// A fresh in-flight record for a request that has not been seen.
    #[allow(clippy::too_many_arguments)]
    pub fn in_flight(
        key: String,
        method: String,
        path: String,
        request_body_hash: Option<String>,
        request_body: Option<Value>,
        ttl: chrono::Duration,
        user_id: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            key,
            method,
            path,
            request_body_hash,
            request_body,
            status: None,
            response_body: None,
            response_hash: None,
            expires_at: now + ttl,
            created_at: now,
            user_id,
            ip_address,
            user_agent,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.status.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
