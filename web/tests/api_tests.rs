//! End-to-end HTTP tests against the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::Duration;
use rsvp_core::environment::Clock;
use rsvp_runtime::RetryPolicy;
use rsvp_testing::{InMemoryStore, fixtures, test_clock};
use rsvp_web::{AppState, CORRELATION_ID_HEADER, RateLimitConfig, build_router};
use serde_json::{Value, json};
use std::sync::Arc;

fn server_with(store: InMemoryStore, rate_limit: RateLimitConfig) -> TestServer {
    let state = AppState::new(store, Arc::new(test_clock()), RetryPolicy::no_retry());
    TestServer::new(build_router(state, rate_limit)).unwrap()
}

fn server(store: InMemoryStore) -> TestServer {
    server_with(
        store,
        RateLimitConfig {
            requests: 10_000,
            window: std::time::Duration::from_secs(60),
            ..RateLimitConfig::default()
        },
    )
}

async fn create_event(server: &TestServer, capacity: u32) -> String {
    let response = server
        .post("/api/events")
        .json(&json!({
            "title": "Rust Meetup",
            "date_time": "2030-06-01T18:00:00Z",
            "location": "Berlin",
            "capacity": capacity,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["event_id"].as_str().unwrap().to_string()
}

async fn create_user(server: &TestServer, name: &str, email: &str) -> String {
    let response = server
        .post("/api/users")
        .json(&json!({ "name": name, "email": email }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["user"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_is_ok_and_echoes_correlation_id() {
    let server = server(InMemoryStore::new());

    let response = server.get("/health").await;

    response.assert_status_ok();
    assert!(response.headers().contains_key(CORRELATION_ID_HEADER));
    let body: Value = response.json();
    assert_eq!(body["status"], "OK");
}

#[tokio::test]
async fn test_ready_reflects_store_availability() {
    let store = InMemoryStore::new();
    let server = server(store.clone());

    server.get("/ready").await.assert_status_ok();

    store.set_unavailable(true);
    let response = server.get("/ready").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["ready"], false);
}

#[tokio::test]
async fn test_create_event_returns_created_event() {
    let server = server(InMemoryStore::new());

    let response = server
        .post("/api/events")
        .json(&json!({
            "title": "Rust Meetup",
            "available_at": "2030-06-01T18:00:00Z",
            "location": "Berlin",
            "capacity": 3,
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["message"], "Event created successfully");
    assert_eq!(body["event"]["capacity"], 3);
    assert_eq!(body["event"]["id"], body["event_id"]);
}

#[tokio::test]
async fn test_create_event_rejects_past_date_and_zero_capacity() {
    let server = server(InMemoryStore::new());

    let response = server
        .post("/api/events")
        .json(&json!({
            "title": "Retro Night",
            "date_time": "2020-01-01T00:00:00Z",
            "location": "Berlin",
            "capacity": 0,
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["details"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_malformed_json_is_validation_error() {
    let server = server(InMemoryStore::new());

    let response = server.post("/api/users").json(&json!({ "name": "Jane" })).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_register_then_duplicate_is_conflict() {
    let server = server(InMemoryStore::new());
    let event_id = create_event(&server, 5).await;
    let user_id = create_user(&server, "Jane Smith", "jane@example.com").await;

    let first = server
        .post(&format!("/api/events/{event_id}/register"))
        .json(&json!({ "user_id": user_id }))
        .await;
    first.assert_status(StatusCode::CREATED);
    let body: Value = first.json();
    assert_eq!(body["message"], "Registration successful");
    assert_eq!(body["registration"]["subject_id"], user_id.as_str());

    let second = server
        .post(&format!("/api/events/{event_id}/register"))
        .json(&json!({ "user_id": user_id }))
        .await;
    second.assert_status(StatusCode::CONFLICT);
    let body: Value = second.json();
    assert_eq!(body["code"], "DUPLICATE_RESERVATION");
}

#[tokio::test]
async fn test_full_event_rejects_with_capacity_exceeded() {
    let server = server(InMemoryStore::new());
    let event_id = create_event(&server, 1).await;
    let first = create_user(&server, "Jane Smith", "jane@example.com").await;
    let second = create_user(&server, "Bob Johnson", "bob@example.com").await;

    server
        .post(&format!("/api/events/{event_id}/register"))
        .json(&json!({ "user_id": first }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .post(&format!("/api/events/{event_id}/register"))
        .json(&json!({ "user_id": second }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "CAPACITY_EXCEEDED");

    let stats: Value = server.get(&format!("/api/events/{event_id}/stats")).await.json();
    assert_eq!(stats["stats"]["remaining_capacity"], 0);
    assert_eq!(stats["stats"]["reservation_count"], 1);
}

#[tokio::test]
async fn test_register_on_past_event_is_rejected() {
    let store = InMemoryStore::new();
    let now = test_clock().now();
    let past = store.insert_resource(fixtures::resource(now - Duration::hours(1), 10));
    let guest = store.insert_subject(fixtures::subject("Jane Smith"));
    let server = server(store);

    let response = server
        .post(&format!("/api/events/{}/register", past.id))
        .json(&json!({ "user_id": guest.id.to_string() }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "RESOURCE_EXPIRED");
}

#[tokio::test]
async fn test_register_unknown_user_is_not_found() {
    let server = server(InMemoryStore::new());
    let event_id = create_event(&server, 5).await;

    let response = server
        .post(&format!("/api/events/{event_id}/register"))
        .json(&json!({ "user_id": "7c9e6679-7425-40de-944b-e07fc1f90ae7" }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_requires_user_id() {
    let server = server(InMemoryStore::new());
    let event_id = create_event(&server, 5).await;

    let response = server
        .post(&format!("/api/events/{event_id}/register"))
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["details"][0], "\"user_id\" is required");
}

#[tokio::test]
async fn test_cancel_frees_the_slot_and_second_cancel_is_not_found() {
    let server = server(InMemoryStore::new());
    let event_id = create_event(&server, 1).await;
    let user_id = create_user(&server, "Jane Smith", "jane@example.com").await;
    let path = format!("/api/events/{event_id}/register");

    server
        .post(&path)
        .json(&json!({ "user_id": user_id }))
        .await
        .assert_status(StatusCode::CREATED);

    let cancelled = server.delete(&path).json(&json!({ "user_id": user_id })).await;
    cancelled.assert_status_ok();
    let body: Value = cancelled.json();
    assert_eq!(body["message"], "Registration cancelled successfully");

    let again = server.delete(&path).json(&json!({ "user_id": user_id })).await;
    again.assert_status(StatusCode::NOT_FOUND);

    // Slot is free again
    server
        .post(&path)
        .json(&json!({ "user_id": user_id }))
        .await
        .assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_event_detail_lists_registered_users() {
    let server = server(InMemoryStore::new());
    let event_id = create_event(&server, 5).await;
    let user_id = create_user(&server, "Jane Smith", "jane@example.com").await;
    server
        .post(&format!("/api/events/{event_id}/register"))
        .json(&json!({ "user_id": user_id }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server.get(&format!("/api/events/{event_id}")).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["event"]["title"], "Rust Meetup");
    assert_eq!(body["event"]["reservation_count"], 1);
    assert_eq!(body["event"]["reserved_subjects"][0]["email"], "jane@example.com");
}

#[tokio::test]
async fn test_upcoming_events_include_remaining_capacity() {
    let store = InMemoryStore::new();
    let now = test_clock().now();
    store.insert_resource(fixtures::resource(now - Duration::days(1), 10));
    let server = server(store);
    create_event(&server, 4).await;

    let body: Value = server.get("/api/events").await.json();

    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["remaining_capacity"], 4);
}

#[tokio::test]
async fn test_users_create_list_and_get() {
    let server = server(InMemoryStore::new());
    let jane = create_user(&server, "Jane Smith", "jane@example.com").await;
    create_user(&server, "Bob Johnson", "bob@example.com").await;

    let duplicate = server
        .post("/api/users")
        .json(&json!({ "name": "Janet", "email": "jane@example.com" }))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);

    let list: Value = server.get("/api/users").await.json();
    let names: Vec<&str> = list["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Bob Johnson", "Jane Smith"]);

    let one: Value = server.get(&format!("/api/users/{jane}")).await.json();
    assert_eq!(one["user"]["email"], "jane@example.com");
}

#[tokio::test]
async fn test_malformed_id_is_bad_request() {
    let server = server(InMemoryStore::new());

    let response = server.get("/api/events/42/stats").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["details"][0], "\"id\" must be a valid GUID");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let server = server(InMemoryStore::new());

    let response = server.get("/api/nothing-here").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["message"], "The requested resource was not found");
}

fn limited_server(requests: u32) -> TestServer {
    server_with(
        InMemoryStore::new(),
        RateLimitConfig {
            requests,
            window: std::time::Duration::from_secs(3600),
            trust_forwarded: true,
            ..RateLimitConfig::default()
        },
    )
}

#[tokio::test]
async fn test_rate_limit_applies_to_api() {
    let server = limited_server(2);

    server.get("/api/users").await.assert_status_ok();
    server.get("/api/users").await.assert_status_ok();
    server
        .get("/api/users")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_health_checks_do_not_spend_api_budget() {
    let server = limited_server(3);

    for _ in 0..5 {
        server.get("/health").await.assert_status_ok();
        server.get("/ready").await.assert_status_ok();
    }

    server.get("/api/events").await.assert_status_ok();
}

#[tokio::test]
async fn test_clients_have_separate_api_budgets() {
    let server = limited_server(1);

    server
        .get("/api/events")
        .add_header("X-Forwarded-For", "203.0.113.1")
        .await
        .assert_status_ok();
    server
        .get("/api/events")
        .add_header("X-Forwarded-For", "203.0.113.1")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    server
        .get("/api/events")
        .add_header("X-Forwarded-For", "198.51.100.7")
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_overlong_email_is_validation_error() {
    let server = server(InMemoryStore::new());
    let email = format!("{}@example.com", "a".repeat(300));

    let response = server
        .post("/api/users")
        .json(&json!({ "name": "Jane Smith", "email": email }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}
