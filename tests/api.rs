//! End-to-end tests of the HTTP surface.
//!
//! Each test builds the router over a fresh in-memory store with a fixed
//! "today" and drives it with `tower::ServiceExt::oneshot`.

#![cfg(feature = "web")]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::{Value, json};
use tower::ServiceExt;

use pixels::app::{AppState, router};
use pixels::store::{MemoryStore, TrackerStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

fn setup() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn TrackerStore> = store.clone();
    let state = AppState::new(shared).unwrap().with_clock(today);
    (router(Arc::new(state), "static"), store)
}

fn request(method: Method, uri: &str, uid: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(uid) = uid {
        builder = builder.header(header::COOKIE, format!("uid={}", uid));
    }
    match body {
        Some(val) => builder.body(Body::from(val.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn raw(app: &Router, method: Method, uri: &str, uid: Option<&str>, body: Option<Value>) -> Response {
    app.clone().oneshot(request(method, uri, uid, body)).await.unwrap()
}

async fn body_bytes(resp: Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn send(app: &Router, method: Method, uri: &str, uid: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let resp = raw(app, method, uri, uid, body).await;
    let status = resp.status();
    let bytes = body_bytes(resp).await;
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()));
    (status, value)
}

async fn create(app: &Router, uid: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/trackers",
        Some(uid),
        Some(json!({ "name": name, "icon": "book" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn add_key(app: &Router, uid: &str, id: &str, name: &str, color: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        &format!("/api/trackers/{}/keys", id),
        Some(uid),
        Some(json!({ "name": name, "color": color })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    body["key"]["id"].as_str().unwrap().to_string()
}

async fn toggle(app: &Router, uid: &str, id: &str, date: &str, key_id: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        &format!("/api/trackers/{}/toggle", id),
        Some(uid),
        Some(json!({ "date": date, "keyId": key_id })),
    )
    .await
}

// ---------------------------------------------------------------------------
// Auth and ownership
// ---------------------------------------------------------------------------

#[tokio::test]
async fn api_requires_owner_cookie() {
    let (app, _) = setup();
    let (status, body) = send(&app, Method::GET, "/api/trackers", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");

    let resp = raw(&app, Method::GET, "/", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn other_owners_trackers_are_not_found() {
    let (app, _) = setup();
    let id = create(&app, "u1", "Reading").await;

    let (status, _) = send(&app, Method::GET, &format!("/api/trackers/{}", id), Some("u2"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = toggle(&app, "u2", &id, "2024-03-01", "k").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/trackers/{}", id), Some("u2"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = send(&app, Method::GET, "/api/trackers", Some("u2"), None).await;
    assert_eq!(list, json!([]));
}

// ---------------------------------------------------------------------------
// Trackers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_list_get_delete() {
    let (app, store) = setup();
    let id = create(&app, "u1", "  Reading ").await;

    let (status, list) = send(&app, Method::GET, "/api/trackers", Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["name"], "Reading");
    assert_eq!(list[0]["icon"], "book");
    assert_eq!(list[0]["progress"], 0);
    assert_eq!(list[0]["daysInYear"], 366);

    let (status, tracker) = send(&app, Method::GET, &format!("/api/trackers/{}", id), Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tracker["ownerId"], "u1");
    assert_eq!(tracker["keys"], json!([]));
    assert_eq!(tracker["entries"], json!({}));

    let (status, body) = send(&app, Method::DELETE, &format!("/api/trackers/{}", id), Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(store.list("u1").is_empty());

    let (status, _) = send(&app, Method::GET, &format!("/api/trackers/{}", id), Some("u1"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn blank_tracker_name_is_a_noop() {
    let (app, store) = setup();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/trackers",
        Some("u1"),
        Some(json!({ "name": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "noop");
    assert!(store.list("u1").is_empty());
}

#[tokio::test]
async fn unknown_icon_is_rejected() {
    let (app, _) = setup();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/trackers",
        Some("u1"),
        Some(json!({ "name": "Gym", "icon": "rocket" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

// ---------------------------------------------------------------------------
// Keys and pixels
// ---------------------------------------------------------------------------

#[tokio::test]
async fn toggle_sets_and_clears_a_day() {
    let (app, store) = setup();
    let id = create(&app, "u1", "Reading").await;
    let key = add_key(&app, "u1", &id, "Read", "#10b981").await;

    let (status, body) = toggle(&app, "u1", &id, "2024-03-01", &key).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    assert_eq!(store.get(&id).unwrap().entries.get(date), Some(key.as_str()));

    let (_, grid) = send(&app, Method::GET, &format!("/api/trackers/{}/grid", id), Some("u1"), None).await;
    assert_eq!(grid["year"], 2024);
    assert_eq!(grid["filledDays"], 1);
    assert_eq!(grid["progress"], 0);
    assert_eq!(grid["band"], "low");
    assert_eq!(grid["months"][2]["name"], "Mar");
    assert_eq!(grid["months"][2]["cells"][0]["color"], "#10b981");
    assert_eq!(grid["months"][2]["cells"][0]["keyName"], "Read");
    assert_eq!(grid["months"][2]["cells"][14]["isToday"], true);

    let (_, body) = toggle(&app, "u1", &id, "2024-03-01", &key).await;
    assert_eq!(body["status"], "ok");
    assert!(store.get(&id).unwrap().entries.is_empty());
}

#[tokio::test]
async fn rejected_toggles_are_noops() {
    let (app, store) = setup();
    let id = create(&app, "u1", "Reading").await;
    let key = add_key(&app, "u1", &id, "Read", "emerald").await;

    for (date, key_id) in [
        ("2024-03-16", key.as_str()),
        ("2023-12-31", key.as_str()),
        ("2024-03-01", "missing"),
    ] {
        let (status, body) = toggle(&app, "u1", &id, date, key_id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "noop");
    }
    assert!(store.get(&id).unwrap().entries.is_empty());

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/trackers/{}/toggle", id),
        Some("u1"),
        Some(json!({ "date": "not-a-date", "keyId": key })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn add_key_validates_input() {
    let (app, store) = setup();
    let id = create(&app, "u1", "Mood").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/trackers/{}/keys", id),
        Some("u1"),
        Some(json!({ "name": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "noop");

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/trackers/{}/keys", id),
        Some("u1"),
        Some(json!({ "name": "Happy", "color": "#123456" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.get(&id).unwrap().keys.is_empty());

    let key = add_key(&app, "u1", &id, " Happy ", "pink").await;
    let keys = store.get(&id).unwrap().keys;
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].id, key);
    assert_eq!(keys[0].name, "Happy");
    assert!(key.starts_with("key_"));
}

#[tokio::test]
async fn delete_key_clears_its_days() {
    let (app, store) = setup();
    let id = create(&app, "u1", "Mood").await;
    let good = add_key(&app, "u1", &id, "Good", "lime").await;
    let bad = add_key(&app, "u1", &id, "Bad", "red").await;
    toggle(&app, "u1", &id, "2024-01-01", &good).await;
    toggle(&app, "u1", &id, "2024-01-02", &bad).await;

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/trackers/{}/keys/{}", id, good),
        Some("u1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let tracker = store.get(&id).unwrap();
    assert_eq!(tracker.keys.len(), 1);
    assert_eq!(tracker.keys[0].id, bad);
    assert_eq!(tracker.entries.len(), 1);
    assert!(tracker.is_consistent());

    let (_, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/trackers/{}/keys/{}", id, good),
        Some("u1"),
        None,
    )
    .await;
    assert_eq!(body["status"], "noop");
}

// ---------------------------------------------------------------------------
// Exports, events and pages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn csv_export_lists_every_day() {
    let (app, _) = setup();
    let id = create(&app, "u1", "Reading Log").await;
    let key = add_key(&app, "u1", &id, "Read", "blue").await;
    toggle(&app, "u1", &id, "2024-02-29", &key).await;

    let resp = raw(&app, Method::GET, &format!("/api/trackers/{}/export.csv", id), Some("u1"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    assert!(
        resp.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("reading-log-2024.csv")
    );

    let text = String::from_utf8(body_bytes(resp).await).unwrap();
    assert_eq!(text.lines().count(), 367);
    assert!(text.contains("2024-02-29,Read,#3b82f6\n"));
}

#[tokio::test]
async fn png_export_is_an_image() {
    let (app, _) = setup();
    let id = create(&app, "u1", "Reading").await;

    let resp = raw(
        &app,
        Method::GET,
        &format!("/api/trackers/{}/export.png?year=2023", id),
        Some("u1"),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = body_bytes(resp).await;
    assert_eq!(&bytes[..4], b"\x89PNG");
}

#[tokio::test]
async fn out_of_range_year_is_rejected() {
    let (app, _) = setup();
    let id = create(&app, "u1", "Reading").await;
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/trackers/{}/grid?year=0", id),
        Some("u1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn events_stream_opens_for_owner() {
    let (app, _) = setup();
    let id = create(&app, "u1", "Reading").await;

    let resp = raw(&app, Method::GET, &format!("/api/trackers/{}/events", id), Some("u1"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");

    let resp = raw(&app, Method::GET, &format!("/api/trackers/{}/events", id), Some("u2"), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owner_events_stream_needs_a_cookie() {
    let (app, _) = setup();
    create(&app, "u1", "Reading").await;

    let resp = raw(&app, Method::GET, "/api/events", Some("u1"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");

    let resp = raw(&app, Method::GET, "/api/events", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn past_year_grid_is_read_only() {
    let (app, _) = setup();
    let id = create(&app, "u1", "Reading").await;

    let (status, grid) = send(
        &app,
        Method::GET,
        &format!("/api/trackers/{}/grid?year=2023", id),
        Some("u1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let first = &grid["months"][0]["cells"][0];
    assert_eq!(first["date"], "2023-01-01");
    assert_eq!(first["isFuture"], false);
    assert_eq!(first["interactive"], false);

    let (_, grid) = send(&app, Method::GET, &format!("/api/trackers/{}/grid", id), Some("u1"), None).await;
    assert_eq!(grid["months"][2]["cells"][14]["interactive"], true);
    assert_eq!(grid["months"][2]["cells"][15]["interactive"], false);
}

async fn tracker_html(app: &Router, uri: &str) -> String {
    let resp = raw(app, Method::GET, uri, Some("u1"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    String::from_utf8(body_bytes(resp).await).unwrap()
}

#[tokio::test]
async fn tracker_page_keeps_the_requested_key_selected() {
    let (app, _) = setup();
    let id = create(&app, "u1", "Reading").await;
    let alpha = add_key(&app, "u1", &id, "Alpha", "violet").await;
    let beta = add_key(&app, "u1", &id, "Beta", "emerald").await;

    let html = tracker_html(&app, &format!("/tracker/{}?key={}", id, beta)).await;
    assert!(html.contains(&format!("value=\"{}\" checked", beta)));
    assert!(!html.contains(&format!("value=\"{}\" checked", alpha)));

    let html = tracker_html(&app, &format!("/tracker/{}", id)).await;
    assert!(html.contains(&format!("value=\"{}\" checked", alpha)));
    assert!(!html.contains(&format!("value=\"{}\" checked", beta)));
}

#[tokio::test]
async fn tracker_page_falls_back_from_a_deleted_key() {
    let (app, _) = setup();
    let id = create(&app, "u1", "Reading").await;
    let alpha = add_key(&app, "u1", &id, "Alpha", "violet").await;
    let beta = add_key(&app, "u1", &id, "Beta", "emerald").await;
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/trackers/{}/keys/{}", id, beta),
        Some("u1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let html = tracker_html(&app, &format!("/tracker/{}?key={}", id, beta)).await;
    assert!(html.contains(&format!("value=\"{}\" checked", alpha)));
    assert!(!html.contains(&beta));

    let html = tracker_html(&app, &format!("/tracker/{}?key=nope", id)).await;
    assert!(html.contains(&format!("value=\"{}\" checked", alpha)));
}

#[tokio::test]
async fn pages_render_trackers() {
    let (app, _) = setup();
    let id = create(&app, "u1", "Reading").await;
    add_key(&app, "u1", &id, "Read", "violet").await;

    let resp = raw(&app, Method::GET, "/", Some("u1"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(html.contains("You have 1 tracker. Keep going!"));
    assert!(html.contains(&format!("/tracker/{}", id)));

    let resp = raw(&app, Method::GET, &format!("/tracker/{}", id), Some("u1"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(html.contains("Reading"));
    assert!(html.contains("data-date=\"2024-12-31\""));
    assert!(html.contains("#8b5cf6"));

    let resp = raw(&app, Method::GET, "/tracker/missing", Some("u1"), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
