//! HTTP surface tests against the in-memory store.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use event_moderation_server::config::Config;
use event_moderation_server::moderation::ModerationService;
use event_moderation_server::notify::LogNotifier;
use event_moderation_server::routes::create_routes;
use event_moderation_server::state::AppState;
use event_moderation_server::store::MemoryStore;

fn app() -> Router {
    let config = Config::from_lookup(|_| None).unwrap();
    let service = ModerationService::new(Arc::new(MemoryStore::new()), Arc::new(LogNotifier));
    create_routes(AppState::new(service), &config)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn indie_fest() -> Value {
    json!({
        "title": "Indie Fest",
        "description": "Three stages of local bands",
        "location": "Bandung",
        "date": "2026-11-14T18:00:00Z",
        "organizer_id": "org-1",
        "tickets": [
            { "name": "VIP", "price": 500000 },
            { "name": "Regular", "price": 150000 }
        ]
    })
}

async fn submit(app: &Router) -> String {
    let (status, body) = call(app, Method::POST, "/api/events-pending", Some(indie_fest())).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check_responds() {
    let (status, body) = call(&app(), Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}

#[tokio::test]
async fn full_moderation_flow() {
    let app = app();
    let id = submit(&app).await;

    let (status, body) = call(&app, Method::GET, "/api/events-pending/pending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["status"], "pending");
    assert_eq!(body["data"][0]["tickets"].as_array().unwrap().len(), 2);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/events-pending/{}/approve", id),
        Some(json!({ "approved_by": "admin-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Indie Fest");
    assert_eq!(body["data"]["source_pending_id"], id.as_str());
    let published_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(&app, Method::GET, &format!("/api/events-pending/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "approved");
    assert_eq!(body["data"]["approved_by"], "admin-1");

    let (status, body) = call(&app, Method::GET, "/api/events", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = call(&app, Method::GET, "/api/events/indie-fest", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], published_id.as_str());

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/events/{}/tickets", published_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/events-pending/{}/approve", id),
        Some(json!({ "approved_by": "admin-2" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "STATE_CONFLICT");
    assert_eq!(body["error"]["message"], "event is not in pending status");

    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/api/events/{}", published_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, "/api/events/latest", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reject_requires_reason() {
    let app = app();
    let id = submit(&app).await;

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/events-pending/{}/reject", id),
        Some(json!({ "rejected_by": "admin-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/events-pending/{}/reject", id),
        Some(json!({ "rejected_by": "admin-1", "rejection_reason": "Venue lacks permit" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "rejected");
    assert_eq!(body["data"]["rejection_reason"], "Venue lacks permit");

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/api/events-pending/{}", id),
        Some(json!({ "title": "Renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn submission_validation_errors_are_400() {
    let app = app();
    let mut draft = indie_fest();
    draft["tickets"] = json!([]);

    let (status, body) = call(&app, Method::POST, "/api/events-pending", Some(draft)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "at least one ticket required");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/events-pending",
        Some(json!({ "title": "No date" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let app = app();

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/events-pending/{}/approve", uuid::Uuid::new_v4()),
        Some(json!({ "approved_by": "admin-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = call(&app, Method::GET, "/api/events-pending/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::GET, "/api/events/no-such-slug", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, Method::GET, "/api/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Route not found");
}

#[tokio::test]
async fn listing_by_status_and_organizer() {
    let app = app();
    submit(&app).await;

    let (status, body) = call(&app, Method::GET, "/api/events-pending?status=approved", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
    assert_eq!(body["data"], json!([]));

    let (status, body) = call(
        &app,
        Method::GET,
        "/api/events-pending/organizer/org-1?status=pending",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, _) = call(&app, Method::GET, "/api/events-pending?status=archived", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_pending_event() {
    let app = app();
    let id = submit(&app).await;

    let (status, _) = call(&app, Method::DELETE, &format!("/api/events-pending/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, Method::GET, &format!("/api/events-pending/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_query_string_uses_error_envelope() {
    let app = app();

    let (status, body) = call(&app, Method::GET, "/api/events?limit=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = call(&app, Method::GET, "/api/events/latest?count=many", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn search_published_events() {
    let app = app();
    let id = submit(&app).await;
    call(
        &app,
        Method::POST,
        &format!("/api/events-pending/{}/approve", id),
        Some(json!({ "approved_by": "admin-1" })),
    )
    .await;

    let (status, body) = call(&app, Method::GET, "/api/events/search?query=bandung", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["title"], "Indie Fest");

    let (status, body) = call(&app, Method::GET, "/api/events/search?query=medan", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn out_of_range_prices_are_validation_errors() {
    let app = app();

    for price in [json!("0.005"), json!(1_000_000_000_000i64)] {
        let mut draft = indie_fest();
        draft["tickets"][0]["price"] = price;

        let (status, body) = call(&app, Method::POST, "/api/events-pending", Some(draft)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}
