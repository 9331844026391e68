//! Canonical JSON normalization and body hashing.
//!
//! Request and response bodies are reduced to a canonical form before
//! hashing so that structurally equal payloads always hash identically,
//! regardless of the order keys arrived in on the wire. `serde_json` maps
//! are ordered (`BTreeMap`), so serializing a `Value` already emits keys
//! lexicographically; canonicalization here is about bounding recursion and
//! giving non-JSON payloads a stable representation.
//!
//! Everything in this module is total: it sits on the request hot path and
//! must never fail a request because of an unusual body shape.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Recursion cutoff. `serde_json::Value` is acyclic by construction, but a
/// deeply nested body must not be able to blow the stack; past this depth
/// the remainder of the branch collapses to `null`.
const MAX_DEPTH: usize = 64;

/// Produce the canonical form of a JSON value.
///
/// Keys are emitted in lexicographic order (the `serde_json` map order),
/// `null` is preserved, and branches nested deeper than [`MAX_DEPTH`]
/// become `null` rather than recursing unboundedly.
pub fn canonicalize(value: &Value) -> Value {
    canonicalize_at(value, 0)
}

fn canonicalize_at(value: &Value, depth: usize) -> Value {
    if depth >= MAX_DEPTH {
        return Value::Null;
    }

    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonicalize_at(v, depth + 1)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| canonicalize_at(item, depth + 1))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

/// Serialize a value in its canonical textual form.
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&canonicalize(value)).unwrap_or_else(|_| "null".to_string())
}

/// Hash a structured body. `None` means "no body" and hashes to `None` so
/// the absence of a payload is distinguishable from an empty object.
pub fn hash_body(body: Option<&Value>) -> Option<String> {
    body.map(|value| hash_bytes(canonical_json(value).as_bytes()))
}

/// Hex-encoded SHA-256 of raw bytes. Fallback for payloads that are not
/// valid JSON.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Stable JSON representation of a binary payload: a base64 string value.
pub fn binary_snapshot(bytes: &[u8]) -> Value {
    Value::String(BASE64.encode(bytes))
}
