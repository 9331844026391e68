//! Scheduler behavior across ticks: ordering, failure isolation, deferred
//! application, reservation release, and paired status settlement.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use common::{audit_count, build_app, parse_json, send, TestApp};

async fn create_property(app: &TestApp, slug: &str) -> Uuid {
    let (status, body) = send(
        &app.router,
        "POST",
        "/v1/properties",
        &[],
        Some(json!({
            "slug": slug,
            "type": "CONDO",
            "price": 1_000_000,
            "i18n": [{ "locale": "en", "title": slug }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    parse_json(&body)["id"].as_str().unwrap().parse().unwrap()
}

async fn schedule_patch(
    app: &TestApp,
    entity_id: Uuid,
    price: i64,
    run_at: Option<chrono::DateTime<Utc>>,
) {
    let mut request = json!({
        "entityType": "property",
        "entityId": entity_id,
        "patch": { "price": price }
    });
    if let Some(run_at) = run_at {
        request["runAt"] = json!(run_at);
    }
    let (status, _) = send(
        &app.router,
        "POST",
        "/v1/schedule",
        &[("x-actor-id", "scheduler-admin")],
        Some(request),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn due_jobs_apply_oldest_first() {
    let app = build_app();
    let p1 = create_property(&app, "tick-1").await;
    let p2 = create_property(&app, "tick-2").await;
    let p3 = create_property(&app, "tick-3").await;

    let now = Utc::now();
    // Staged out of order; run_at decides application order.
    schedule_patch(&app, p3, 300, Some(now - Duration::minutes(1))).await;
    schedule_patch(&app, p1, 100, Some(now - Duration::minutes(3))).await;
    schedule_patch(&app, p2, 200, Some(now - Duration::minutes(2))).await;

    app.worker.tick().await;

    let events = app.stores.audit.recent(1000).await.unwrap();
    let updated: Vec<Uuid> = events
        .iter()
        .filter(|event| event.action == "property.update")
        .filter_map(|event| event.entity_id)
        .collect();
    assert_eq!(updated, vec![p1, p2, p3]);

    let (status, body) = send(
        &app.router,
        "GET",
        "/v1/schedule/jobs?status=success",
        &[],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(&body)["jobs"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn one_tick_rebuilds_the_index_once_for_the_whole_batch() {
    let app = build_app();
    let p1 = create_property(&app, "batch-1").await;
    let p2 = create_property(&app, "batch-2").await;

    let past = Utc::now() - Duration::minutes(1);
    schedule_patch(&app, p1, 111, Some(past)).await;
    schedule_patch(&app, p2, 222, Some(past)).await;

    let before = app.index.rebuilds();
    app.worker.tick().await;
    assert_eq!(app.index.rebuilds(), before + 1);
}

#[tokio::test]
async fn failing_job_does_not_block_the_rest_of_the_batch() {
    let app = build_app();
    let missing = Uuid::new_v4();
    let good = create_property(&app, "survivor").await;

    let now = Utc::now();
    // The broken job is due first.
    schedule_patch(&app, missing, 999, Some(now - Duration::minutes(5))).await;
    schedule_patch(&app, good, 123, Some(now - Duration::minutes(1))).await;

    app.worker.tick().await;

    let (_, body) = send(&app.router, "GET", "/v1/schedule/jobs?limit=10", &[], None).await;
    let jobs = parse_json(&body)["jobs"].as_array().unwrap().clone();
    assert_eq!(jobs.len(), 2);

    for job in &jobs {
        let change_set = &job["changeSet"];
        match change_set["entityId"].as_str().unwrap() {
            id if id == missing.to_string() => {
                assert_eq!(job["status"], "failed");
                assert_eq!(change_set["status"], "failed");
                assert!(job["log"].as_str().unwrap().contains("not found"));
            }
            id if id == good.to_string() => {
                assert_eq!(job["status"], "success");
                assert_eq!(change_set["status"], "applied");
            }
            other => panic!("unexpected entity id {other}"),
        }
    }

    // The surviving patch landed.
    let (_, body) = send(&app.router, "GET", &format!("/v1/properties/{good}"), &[], None).await;
    assert_eq!(parse_json(&body)["price"], 123);
}

#[tokio::test]
async fn jobs_scheduled_for_now_wait_for_the_next_tick() {
    let app = build_app();
    let id = create_property(&app, "deferred").await;
    schedule_patch(&app, id, 777, None).await;

    // Not applied synchronously.
    let (_, body) = send(&app.router, "GET", &format!("/v1/properties/{id}"), &[], None).await;
    assert_eq!(parse_json(&body)["price"], 1_000_000);

    app.worker.tick().await;

    let (_, body) = send(&app.router, "GET", &format!("/v1/properties/{id}"), &[], None).await;
    assert_eq!(parse_json(&body)["price"], 777);
}

#[tokio::test]
async fn expired_unsecured_reservations_release_exactly_once() {
    let app = build_app();
    let (status, body) = send(
        &app.router,
        "POST",
        "/v1/properties",
        &[],
        Some(json!({
            "slug": "reserved-no-deposit",
            "type": "HOUSE",
            "price": 2_000_000,
            "status": "RESERVED",
            "deposit": false,
            "reservedUntil": Utc::now() - Duration::minutes(10),
            "i18n": [{ "locale": "en", "title": "Reserved house" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = parse_json(&body)["id"].as_str().unwrap().to_string();

    app.worker.tick().await;
    assert_eq!(audit_count(&app, "property.reservation.release").await, 1);

    let (_, body) = send(&app.router, "GET", &format!("/v1/properties/{id}"), &[], None).await;
    let property = parse_json(&body);
    assert_eq!(property["status"], "AVAILABLE");
    assert!(property["reservedUntil"].is_null());

    // Repeated ticks do not release again.
    app.worker.tick().await;
    app.worker.tick().await;
    assert_eq!(audit_count(&app, "property.reservation.release").await, 1);
}

#[tokio::test]
async fn reservations_with_deposit_are_left_alone() {
    let app = build_app();
    let (status, body) = send(
        &app.router,
        "POST",
        "/v1/properties",
        &[],
        Some(json!({
            "slug": "reserved-deposit",
            "type": "CONDO",
            "price": 900_000,
            "status": "RESERVED",
            "deposit": true,
            "reservedUntil": Utc::now() - Duration::minutes(10),
            "i18n": [{ "locale": "en", "title": "Secured condo" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = parse_json(&body)["id"].as_str().unwrap().to_string();

    app.worker.tick().await;

    let (_, body) = send(&app.router, "GET", &format!("/v1/properties/{id}"), &[], None).await;
    assert_eq!(parse_json(&body)["status"], "RESERVED");
    assert_eq!(audit_count(&app, "property.reservation.release").await, 0);
}

#[tokio::test]
async fn invalid_patches_are_rejected_at_staging_time() {
    let app = build_app();
    let id = create_property(&app, "validated").await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/v1/schedule",
        &[],
        Some(json!({
            "entityType": "property",
            "entityId": id,
            "patch": { "price": -10 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse_json(&body)["error"], "VALIDATION");

    // Workflow fields cannot ride in through the deferred path either.
    let (status, _) = send(
        &app.router,
        "POST",
        "/v1/schedule",
        &[],
        Some(json!({
            "entityType": "property",
            "entityId": id,
            "patch": { "workflowState": "PUBLISHED" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app.router, "GET", "/v1/schedule/jobs", &[], None).await;
    assert_eq!(parse_json(&body)["jobs"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn unknown_entity_kinds_are_rejected() {
    let app = build_app();
    let (status, body) = send(
        &app.router,
        "POST",
        "/v1/schedule",
        &[],
        Some(json!({
            "entityType": "vehicle",
            "entityId": Uuid::new_v4(),
            "patch": { "price": 1 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse_json(&body)["error"], "UNSUPPORTED_ENTITY_TYPE");
}

#[tokio::test]
async fn job_listing_is_newest_first_and_capped() {
    let app = build_app();
    let id = create_property(&app, "listing").await;

    let now = Utc::now();
    schedule_patch(&app, id, 1, Some(now - Duration::minutes(2))).await;
    schedule_patch(&app, id, 2, Some(now - Duration::minutes(1))).await;
    schedule_patch(&app, id, 3, Some(now + Duration::minutes(30))).await;

    let (_, body) = send(&app.router, "GET", "/v1/schedule/jobs", &[], None).await;
    let jobs = parse_json(&body)["jobs"].as_array().unwrap().clone();
    assert_eq!(jobs.len(), 3);
    let run_ats: Vec<chrono::DateTime<chrono::FixedOffset>> = jobs
        .iter()
        .map(|j| chrono::DateTime::parse_from_rfc3339(j["runAt"].as_str().unwrap()).unwrap())
        .collect();
    assert!(
        run_ats.windows(2).all(|pair| pair[0] >= pair[1]),
        "jobs must be newest-runAt-first: {run_ats:?}"
    );

    let (status, _) = send(
        &app.router,
        "GET",
        "/v1/schedule/jobs?status=paused",
        &[],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
