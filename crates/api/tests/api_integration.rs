//! HTTP-level tests over the in-memory composition of the service.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower::ServiceExt;

use api::config::Config;

fn test_app() -> (Router, api::Background) {
    // Relay left on its default 60s startup delay so it stays quiet for
    // the duration of a test; workers and listener drive the saga.
    let config = Config::default();
    let (state, background) = api::create_default_state(&config);
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
    (api::create_app(state, metrics_handle), background)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn valid_booking_body() -> serde_json::Value {
    serde_json::json!({
        "guest_email": "guest@example.com",
        "room_ids": ["R-204"],
        "check_in": "2026-09-01",
        "check_out": "2026-09-04",
        "deposit_cents": 15000
    })
}

async fn post_booking(app: &Router, body: serde_json::Value) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/bookings")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

/// Polls a booking until it reaches `status` or the timeout elapses.
async fn wait_for_status(app: &Router, booking_id: &str, status: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let (code, body) = get_json(app, &format!("/bookings/{booking_id}")).await;
        assert_eq!(code, StatusCode::OK);
        if body["status"] == status {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "booking {booking_id} never reached {status}, last seen {}",
            body["status"]
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn health_endpoint_responds() {
    let (app, background) = test_app();
    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    background.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn create_booking_is_accepted_and_confirms() {
    let (app, background) = test_app();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = post_booking(&app, valid_booking_body()).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    let booking_id = body["booking_id"].as_str().unwrap().to_string();
    assert!(body["saga_id"].as_str().is_some());
    assert_eq!(body["status"], "Pending");

    wait_for_status(&app, &booking_id, "Confirmed").await;
    background.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_stay_is_rejected_synchronously() {
    let (app, background) = test_app();

    let mut body = valid_booking_body();
    body["check_out"] = serde_json::json!("2026-09-01");
    let response = post_booking(&app, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut body = valid_booking_body();
    body["room_ids"] = serde_json::json!([]);
    let response = post_booking(&app, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut body = valid_booking_body();
    body["deposit_cents"] = serde_json::json!(0);
    let response = post_booking(&app, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    background.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_booking_returns_not_found() {
    let (app, background) = test_app();
    let (status, _) = get_json(
        &app,
        &format!("/bookings/{}", uuid::Uuid::new_v4()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(&app, "/bookings/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    background.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn saga_endpoint_shows_channel_rows() {
    let (app, background) = test_app();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = post_booking(&app, valid_booking_body()).await;
    let body = body_json(response).await;
    let booking_id = body["booking_id"].as_str().unwrap().to_string();
    wait_for_status(&app, &booking_id, "Confirmed").await;

    let (status, saga) = get_json(&app, &format!("/bookings/{booking_id}/saga")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saga["booking_status"], "Confirmed");

    let rows = saga["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    for row in rows {
        assert_eq!(row["saga_status"], "Succeeded");
        assert_eq!(row["outbox_status"], "Completed");
    }

    background.shutdown();
}
