//! Error taxonomy for the CMS core.
//!
//! A single `thiserror` enum covers every caller-visible failure. Each
//! variant maps to an HTTP status and a stable machine-readable code so the
//! API layer and the idempotency middleware can render uniform bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum CmsError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("gone: {0}")]
    Gone(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("idempotency key reused with a different request body")]
    IdempotencyKeyConflict,

    #[error("a request with this idempotency key is still in flight")]
    DuplicateRequest,

    #[error("unsupported entity type: {0}")]
    UnsupportedEntityType(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CmsError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gone(_) => StatusCode::GONE,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::IdempotencyKeyConflict => StatusCode::CONFLICT,
            Self::DuplicateRequest => StatusCode::CONFLICT,
            Self::UnsupportedEntityType(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code rendered in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Gone(_) => "GONE",
            Self::Conflict(_) => "CONFLICT",
            Self::IdempotencyKeyConflict => "IDEMPOTENCY_KEY_CONFLICT",
            Self::DuplicateRequest => "DUPLICATE_REQUEST",
            Self::UnsupportedEntityType(_) => "UNSUPPORTED_ENTITY_TYPE",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for CmsError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let body = match &self {
            // The two idempotency conflicts are part of the wire contract:
            // clients match on the bare code.
            Self::IdempotencyKeyConflict | Self::DuplicateRequest => {
                json!({ "error": self.code() })
            }
            Self::Internal(source) => {
                error!(error = %source, "internal error");
                json!({ "error": self.code(), "message": "internal server error" })
            }
            other => json!({ "error": other.code(), "message": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

pub type CmsResult<T> = Result<T, CmsError>;
