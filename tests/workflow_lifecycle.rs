//! Entity lifecycle over HTTP: transitions, visibility, soft delete, and
//! the restore retention boundary.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use estate_cms::audit::AuditEvent;
use estate_cms::store::PropertyStore;
use estate_cms::workflow::retention_window;

use common::{build_app, parse_json, send, TestApp};

const PREVIEW: [(&str, &str); 1] = [("x-preview-mode", "1")];

async fn create_property(app: &TestApp, slug: &str) -> Uuid {
    let (status, body) = send(
        &app.router,
        "POST",
        "/v1/properties",
        &[],
        Some(json!({
            "slug": slug,
            "type": "HOUSE",
            "price": 3_000_000,
            "i18n": [{ "locale": "en", "title": slug }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    parse_json(&body)["id"].as_str().unwrap().parse().unwrap()
}

/// Rewrite `deleted_at` directly in the store, as if the deletion happened
/// in the past.
async fn backdate_deletion(app: &TestApp, id: Uuid, deleted_at: chrono::DateTime<Utc>) {
    app.stores
        .properties
        .update_with(
            id,
            Box::new(move |property| {
                property.deleted_at = Some(deleted_at);
                Ok(AuditEvent::new("test.backdate", "Property", property.id))
            }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn scheduled_transition_requires_timestamp() {
    let app = build_app();
    let id = create_property(&app, "transition-validation").await;
    let path = format!("/v1/properties/{id}/transition");

    let (status, body) = send(
        &app.router,
        "POST",
        &path,
        &[],
        Some(json!({ "target": "SCHEDULED" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse_json(&body)["error"], "VALIDATION");

    let at = Utc::now() + Duration::hours(6);
    let (status, body) = send(
        &app.router,
        "POST",
        &path,
        &[],
        Some(json!({ "target": "SCHEDULED", "scheduledAt": at })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let property = parse_json(&body);
    assert_eq!(property["workflowState"], "SCHEDULED");
    assert!(property["scheduledAt"].is_string());
    assert!(property["publishedAt"].is_null());
    assert!(property["hiddenAt"].is_null());
}

#[tokio::test]
async fn hidden_entities_vanish_from_public_reads_but_not_preview() {
    let app = build_app();
    let id = create_property(&app, "hide-me").await;
    let path = format!("/v1/properties/{id}");

    let (status, _) = send(&app.router, "GET", &path, &[], None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app.router,
        "POST",
        &format!("{path}/transition"),
        &[],
        Some(json!({ "target": "HIDDEN" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app.router, "GET", &path, &[], None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app.router, "GET", &path, &PREVIEW, None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app.router, "GET", "/v1/properties", &[], None).await;
    assert_eq!(parse_json(&body)["data"].as_array().unwrap().len(), 0);
    let (_, body) = send(&app.router, "GET", "/v1/properties", &PREVIEW, None).await;
    assert_eq!(parse_json(&body)["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn soft_deleted_entities_are_excluded_regardless_of_state() {
    let app = build_app();
    let id = create_property(&app, "deleted-but-published").await;
    let path = format!("/v1/properties/{id}");

    let (status, _) = send(&app.router, "DELETE", &path, &[], None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app.router, "GET", &path, &[], None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Recently deleted rows remain visible to preview within retention.
    let (status, body) = send(&app.router, "GET", &path, &PREVIEW, None).await;
    assert_eq!(status, StatusCode::OK);
    let property = parse_json(&body);
    assert_eq!(property["workflowState"], "HIDDEN");
    assert!(property["deletedAt"].is_string());
}

#[tokio::test]
async fn restore_just_inside_the_retention_window_succeeds() {
    let app = build_app();
    let id = create_property(&app, "restore-in-time").await;
    let path = format!("/v1/properties/{id}");

    let (status, _) = send(&app.router, "DELETE", &path, &[], None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    backdate_deletion(&app, id, Utc::now() - retention_window() + Duration::seconds(1)).await;

    let (status, body) = send(&app.router, "POST", &format!("{path}/restore"), &[], None).await;
    assert_eq!(status, StatusCode::OK);
    let property = parse_json(&body);
    assert_eq!(property["workflowState"], "DRAFT");
    assert!(property["deletedAt"].is_null());
    assert!(property["publishedAt"].is_null());
}

#[tokio::test]
async fn restore_just_past_the_retention_window_is_gone() {
    let app = build_app();
    let id = create_property(&app, "restore-too-late").await;
    let path = format!("/v1/properties/{id}");

    let (status, _) = send(&app.router, "DELETE", &path, &[], None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    backdate_deletion(&app, id, Utc::now() - retention_window() - Duration::seconds(1)).await;

    let (status, body) = send(&app.router, "POST", &format!("{path}/restore"), &[], None).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(parse_json(&body)["error"], "GONE");
}

#[tokio::test]
async fn restoring_a_live_entity_is_not_found() {
    let app = build_app();
    let id = create_property(&app, "never-deleted").await;

    let (status, _) = send(
        &app.router,
        "POST",
        &format!("/v1/properties/{id}/restore"),
        &[],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deferred_article_publication_goes_live_after_the_tick() {
    let app = build_app();
    let (status, body) = send(
        &app.router,
        "POST",
        "/v1/articles",
        &[],
        Some(json!({
            "slug": "launch-note",
            "i18n": [{ "locale": "en", "title": "Launch note", "body": "soon" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let article = parse_json(&body);
    assert_eq!(article["workflowState"], "DRAFT");
    let id = article["id"].as_str().unwrap().to_string();

    // Drafts are not publicly readable.
    let (status, _) = send(&app.router, "GET", "/v1/articles/slug/launch-note", &[], None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app.router,
        "POST",
        "/v1/schedule",
        &[],
        Some(json!({
            "entityType": "article",
            "entityId": id,
            "patch": { "published": true },
            "runAt": Utc::now() - Duration::seconds(30)
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    app.worker.tick().await;

    let (status, body) = send(&app.router, "GET", "/v1/articles/slug/launch-note", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    let article = parse_json(&body);
    assert_eq!(article["workflowState"], "PUBLISHED");
    assert!(article["publishedAt"].is_string());
}

#[tokio::test]
async fn workflow_timestamps_track_the_transition() {
    let app = build_app();
    let id = create_property(&app, "timestamps").await;
    let path = format!("/v1/properties/{id}");

    let (_, body) = send(&app.router, "GET", &path, &[], None).await;
    let before = parse_json(&body);
    assert_eq!(before["workflowState"], "PUBLISHED");
    assert_eq!(before["workflowChangedAt"], before["publishedAt"]);

    let (_, body) = send(
        &app.router,
        "POST",
        &format!("{path}/transition"),
        &PREVIEW,
        Some(json!({ "target": "REVIEW" })),
    )
    .await;
    let after = parse_json(&body);
    assert_eq!(after["workflowState"], "REVIEW");
    assert!(after["publishedAt"].is_null());
    assert!(after["scheduledAt"].is_null());
    assert!(after["hiddenAt"].is_null());
    assert_ne!(after["workflowChangedAt"], before["workflowChangedAt"]);
}
