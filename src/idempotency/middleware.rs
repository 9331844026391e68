//! Request guard enforcing at-most-once execution of keyed mutations.
//!
//! The guard is request-scoped and re-entrant: concurrent duplicates racing
//! past the lookup are resolved by the store's uniqueness constraint on
//! (key, method, path) — no in-process locking, so it stays correct when
//! multiple instances share one store.

use anyhow::anyhow;
use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::Value;
use tracing::warn;

use crate::api::AppState;
use crate::canonical::{binary_snapshot, canonicalize, hash_body, hash_bytes};
use crate::error::{CmsError, CmsResult};
use crate::store::InsertOutcome;

use super::{IdempotencyRecord, IDEMPOTENCY_KEY_HEADER};

/// Bodies beyond this size are rejected rather than buffered.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Axum middleware entry point. Layered over every route; only
/// state-mutating methods with an idempotency key engage the ledger.
pub async fn guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match run(state, request, next).await {
        Ok(response) => response,
        Err(error) => error.into_response(),
    }
}

async fn run(state: AppState, request: Request, next: Next) -> CmsResult<Response> {
    if !is_mutating(request.method()) {
        return Ok(next.run(request).await);
    }
    let key = match header_value(request.headers(), IDEMPOTENCY_KEY_HEADER) {
        Some(key) if !key.trim().is_empty() => key,
        _ => return Ok(next.run(request).await),
    };

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| CmsError::Internal(anyhow!("failed to buffer request body: {e}")))?;

    let method = parts.method.to_string();
    let path = parts.uri.path().to_string();
    let (body_snapshot, body_hash) = snapshot_and_hash(&bytes);

    let store = state.stores.idempotency.clone();

    // Resolve against the ledger. Creation races (two duplicates passing
    // the lookup simultaneously) surface as AlreadyExists and loop back to
    // re-evaluate the record the winner created.
    let mut attempts = 0;
    loop {
        attempts += 1;
        let now = Utc::now();

        match store.find(&key, &method, &path).await? {
            Some(record) if record.is_expired(now) => {
                store.delete(&key, &method, &path).await?;
            }
            Some(record) => {
                if record.request_body_hash != body_hash {
                    return Err(CmsError::IdempotencyKeyConflict);
                }
                if record.is_finalized() {
                    return Ok(replay(&record));
                }
                return Err(CmsError::DuplicateRequest);
            }
            None => {}
        }

        let record = IdempotencyRecord::in_flight(
            key.clone(),
            method.clone(),
            path.clone(),
            body_hash.clone(),
            body_snapshot.clone(),
            state.idempotency_ttl,
            header_value(&parts.headers, "x-actor-id"),
            client_ip(&parts.headers),
            header_value(&parts.headers, header::USER_AGENT.as_str()),
        );
        match store.create_in_flight(record).await? {
            InsertOutcome::Created => break,
            InsertOutcome::AlreadyExists if attempts < 2 => continue,
            InsertOutcome::AlreadyExists => return Err(CmsError::DuplicateRequest),
        }
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;
    let status = response.status();

    if status.is_success() || status.is_redirection() {
        let (res_parts, res_body) = response.into_parts();
        let res_bytes = match to_bytes(res_body, MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(error) => {
                // The mutation committed but its response cannot be
                // snapshotted; drop the record so the key stays retryable.
                warn!(key = %key, error = %error, "failed to buffer response for idempotency record");
                let _ = store.delete(&key, &method, &path).await;
                return Err(CmsError::Internal(anyhow!("failed to buffer response body")));
            }
        };

        let response_body = if res_bytes.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&res_bytes).into_owned())
        };
        let response_hash = if res_bytes.is_empty() {
            None
        } else {
            Some(
                serde_json::from_slice::<Value>(&res_bytes)
                    .ok()
                    .and_then(|value| hash_body(Some(&value)))
                    .unwrap_or_else(|| hash_bytes(&res_bytes)),
            )
        };

        if let Err(error) = store
            .finalize(
                &key,
                &method,
                &path,
                status.as_u16(),
                response_body,
                response_hash,
                Utc::now() + state.idempotency_ttl,
            )
            .await
        {
            // Left in flight; the TTL sweep reclaims it.
            warn!(key = %key, error = %error, "failed to finalize idempotency record");
        }

        Ok(Response::from_parts(res_parts, Body::from(res_bytes)))
    } else {
        // 4xx/5xx: the key becomes retryable.
        if let Err(error) = store.delete(&key, &method, &path).await {
            warn!(key = %key, error = %error, "failed to release idempotency record");
        }
        Ok(response)
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for")
        .map(|forwarded| forwarded.split(',').next().unwrap_or("").trim().to_string())
        .filter(|ip| !ip.is_empty())
}

/// Canonical snapshot and hash of a request body. Non-JSON payloads get a
/// base64 snapshot and a raw-byte hash; an empty body is "no body".
fn snapshot_and_hash(bytes: &Bytes) -> (Option<Value>, Option<String>) {
    if bytes.is_empty() {
        return (None, None);
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => {
            let canonical = canonicalize(&value);
            let hash = hash_body(Some(&canonical));
            (Some(canonical), hash)
        }
        Err(_) => (Some(binary_snapshot(bytes)), Some(hash_bytes(bytes))),
    }
}

/// Rebuild the stored terminal response byte-for-byte.
fn replay(record: &IdempotencyRecord) -> Response {
    let status = record
        .status
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);

    match &record.response_body {
        Some(body) if !body.is_empty() => Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.clone()))
            .unwrap_or_else(|_| status.into_response()),
        _ => Response::builder()
            .status(status)
            .body(Body::empty())
            .unwrap_or_else(|_| status.into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_mutating_methods_engage_the_guard() {
        assert!(is_mutating(&Method::POST));
        assert!(is_mutating(&Method::PUT));
        assert!(is_mutating(&Method::PATCH));
        assert!(is_mutating(&Method::DELETE));
        assert!(!is_mutating(&Method::GET));
        assert!(!is_mutating(&Method::HEAD));
    }

    #[test]
    fn empty_body_is_distinct_from_empty_object() {
        let (none_snapshot, none_hash) = snapshot_and_hash(&Bytes::new());
        assert!(none_snapshot.is_none());
        assert!(none_hash.is_none());

        let (some_snapshot, some_hash) = snapshot_and_hash(&Bytes::from_static(b"{}"));
        assert!(some_snapshot.is_some());
        assert!(some_hash.is_some());
    }

    #[test]
    fn non_json_bodies_still_hash() {
        let (snapshot, hash) = snapshot_and_hash(&Bytes::from_static(b"\x00\x01binary"));
        assert!(matches!(snapshot, Some(Value::String(_))));
        assert_eq!(hash.unwrap().len(), 64);
    }

    #[test]
    fn forwarded_ip_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, 172.16.0.9".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.1"));
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
