//! Shared harness: the real router over the in-memory store.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use estate_cms::api::{build_router, AppState};
use estate_cms::index::{CountingIndex, SearchIndex};
use estate_cms::scheduler::{SchedulerService, SchedulerWorker};
use estate_cms::services::EntityServices;
use estate_cms::store::{MemoryStores, Stores};

pub struct TestApp {
    pub router: Router,
    pub stores: Stores,
    pub memory: Arc<MemoryStores>,
    pub index: Arc<CountingIndex>,
    pub worker: Arc<SchedulerWorker>,
}

pub fn build_app() -> TestApp {
    let (stores, memory) = Stores::in_memory();
    let index = Arc::new(CountingIndex::default());
    let dyn_index: Arc<dyn SearchIndex> = index.clone();

    let services = Arc::new(EntityServices::new(stores.clone(), dyn_index.clone()));
    let scheduler = Arc::new(SchedulerService::new(stores.clone()));
    let worker = Arc::new(SchedulerWorker::new(
        stores.clone(),
        services.clone(),
        dyn_index,
        Duration::from_secs(60),
        10,
    ));

    let state = AppState {
        stores: stores.clone(),
        services,
        scheduler,
        idempotency_ttl: chrono::Duration::hours(24),
    };

    TestApp {
        router: build_router(state),
        stores,
        memory,
        index,
        worker,
    }
}

/// Fire one request at the router and collect the full response.
pub async fn send(
    router: &Router,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec();
    (status, bytes)
}

pub fn parse_json(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap_or(Value::Null)
}

/// Count audit events with the given action.
pub async fn audit_count(app: &TestApp, action: &str) -> usize {
    app.stores
        .audit
        .recent(1000)
        .await
        .expect("audit log")
        .iter()
        .filter(|event| event.action == action)
        .count()
}
