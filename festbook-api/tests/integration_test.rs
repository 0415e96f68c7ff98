use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use festbook_api::{app, AppState};
use festbook_engine::{BookingEngine, EngineRules, InMemoryBookingStore, InMemoryCatalog, PromoRegistry};

fn test_app() -> Router {
    let catalog = Arc::new(InMemoryCatalog::new());
    let engine = BookingEngine::new(
        catalog.clone(),
        Arc::new(InMemoryBookingStore::new()),
        Arc::new(PromoRegistry::new()),
        EngineRules::default(),
    );
    app(AppState { engine, catalog })
}

async fn request(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let body = match body {
        Some(v) => Body::from(v.to_string()),
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn publish_event(app: &Router, total_general: u32) -> String {
    let starts_at = chrono::Utc::now() + chrono::Duration::days(14);
    let (status, body) = request(
        app,
        "POST",
        "/v1/admin/events",
        Some(json!({
            "name": "Tech Symposium",
            "venue": "Convention Hall",
            "starts_at": starts_at.to_rfc3339(),
            "base_price": 100.0,
            "seats": [
                { "seat_type": "general", "total": total_general },
                { "seat_type": "vip", "total": 10 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["event"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_booking_flow_over_http() {
    let app = test_app();
    let event_id = publish_event(&app, 50).await;

    let uri = format!("/v1/events/{}/availability/general", event_id);
    let (status, body) = request(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], 50);

    let (status, body) = request(
        &app,
        "POST",
        "/v1/sessions",
        Some(json!({ "event_id": event_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = body["session_id"].as_str().unwrap().to_string();

    let (status, body) = request(
        &app,
        "POST",
        &format!("/v1/sessions/{}/seats", session_id),
        Some(json!({ "seat_type": "general", "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let hold_id = body["hold_id"].as_str().unwrap().to_string();
    assert!(body["expires_at"].as_i64().unwrap() > chrono::Utc::now().timestamp());

    let (_, body) = request(&app, "GET", &uri, None).await;
    assert_eq!(body["held"], 2);
    assert_eq!(body["available"], 48);

    let (status, body) = request(
        &app,
        "POST",
        &format!("/v1/sessions/{}/details", session_id),
        Some(json!({
            "contact_info": {
                "name": "Priya Sharma",
                "email": "priya@college.edu",
                "phone": "9876543210"
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let total = body["quote"]["total"].as_f64().unwrap();
    // 2 x 100, 18% tax, flat fee 50.
    assert!((total - 286.0).abs() < 1e-9);

    let (status, body) = request(
        &app,
        "POST",
        &format!("/v1/sessions/{}/payment", session_id),
        Some(json!({ "payment_reference": "pay_http_1", "verified_amount": total })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CONFIRMED");
    let booking_id = body["id"].as_str().unwrap().to_string();

    // A duplicate gateway webhook resolves to the same booking.
    let (status, body) = request(
        &app,
        "POST",
        "/v1/webhooks/payments",
        Some(json!({
            "hold_id": hold_id,
            "payment_reference": "pay_http_1",
            "verified_amount": total
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"].as_str().unwrap(), booking_id);

    let (_, body) = request(&app, "GET", &uri, None).await;
    assert_eq!(body["confirmed"], 2);
    assert_eq!(body["available"], 48);
}

#[tokio::test]
async fn test_insufficient_seats_maps_to_conflict() {
    let app = test_app();
    let event_id = publish_event(&app, 3).await;

    let (_, body) = request(&app, "POST", "/v1/sessions", Some(json!({ "event_id": event_id }))).await;
    let session_id = body["session_id"].as_str().unwrap().to_string();

    let (status, _) = request(
        &app,
        "POST",
        &format!("/v1/sessions/{}/seats", session_id),
        Some(json!({ "seat_type": "general", "quantity": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_amount_mismatch_maps_to_payment_required() {
    let app = test_app();
    let event_id = publish_event(&app, 10).await;

    let (_, body) = request(&app, "POST", "/v1/sessions", Some(json!({ "event_id": event_id }))).await;
    let session_id = body["session_id"].as_str().unwrap().to_string();

    request(
        &app,
        "POST",
        &format!("/v1/sessions/{}/seats", session_id),
        Some(json!({ "seat_type": "general", "quantity": 1 })),
    )
    .await;
    request(
        &app,
        "POST",
        &format!("/v1/sessions/{}/details", session_id),
        Some(json!({
            "contact_info": {
                "name": "Arjun Rao",
                "email": "arjun@college.edu",
                "phone": "9876501234"
            }
        })),
    )
    .await;

    let (status, _) = request(
        &app,
        "POST",
        &format!("/v1/sessions/{}/payment", session_id),
        Some(json!({ "payment_reference": "pay_bad", "verified_amount": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn test_bad_contact_info_maps_to_unprocessable() {
    let app = test_app();
    let event_id = publish_event(&app, 10).await;

    let (_, body) = request(&app, "POST", "/v1/sessions", Some(json!({ "event_id": event_id }))).await;
    let session_id = body["session_id"].as_str().unwrap().to_string();

    request(
        &app,
        "POST",
        &format!("/v1/sessions/{}/seats", session_id),
        Some(json!({ "seat_type": "general", "quantity": 1 })),
    )
    .await;

    let (status, _) = request(
        &app,
        "POST",
        &format!("/v1/sessions/{}/details", session_id),
        Some(json!({
            "contact_info": { "name": "A", "email": "nope", "phone": "1" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = test_app();
    let (status, _) = request(
        &app,
        "POST",
        &format!("/v1/sessions/{}/cancel", uuid::Uuid::new_v4()),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
