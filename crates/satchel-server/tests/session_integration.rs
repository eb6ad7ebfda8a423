//! Session middleware integration tests.
//!
//! Drive a router through the full request cycle and feed `Set-Cookie`
//! headers back as the next request's `Cookie` header.

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use satchel_session::{SessionOptions, SessionStore};
use satchel_session::testing::{FailingStore, RecordingStore};

use common::{app, inline_manager, manager, send, send_request};

const KEY: &str = "koa:sess";

#[tokio::test]
async fn test_inline_counter_across_requests() {
    let app = app(inline_manager());

    let first = send(&app, "GET", "/views", None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["views"], 1);
    let cookie = first.cookie(KEY).unwrap();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=86400"));

    let pair = first.cookie_pair(KEY).unwrap();
    let second = send(&app, "GET", "/views", Some(&pair)).await;
    assert_eq!(second.body["views"], 2);

    let pair = second.cookie_pair(KEY).unwrap();
    let third = send(&app, "GET", "/views", Some(&pair)).await;
    assert_eq!(third.body["views"], 3);
}

#[tokio::test]
async fn test_read_only_request_sets_no_cookie() {
    let app = app(inline_manager());

    let fresh = send(&app, "GET", "/peek", None).await;
    assert!(fresh.set_cookies.is_empty());
    assert_eq!(fresh.body["is_new"], true);

    let first = send(&app, "GET", "/views", None).await;
    let pair = first.cookie_pair(KEY).unwrap();
    let peek = send(&app, "GET", "/peek", Some(&pair)).await;
    assert!(peek.set_cookies.is_empty());
    assert_eq!(peek.body["views"], 1);
    assert_eq!(peek.body["is_new"], false);
}

#[tokio::test]
async fn test_tampered_cookie_starts_fresh() {
    let app = app(inline_manager());

    let first = send(&app, "GET", "/views", None).await;
    let pair = first.cookie_pair(KEY).unwrap();
    let tampered = format!("{}x", pair);

    let second = send(&app, "GET", "/views", Some(&tampered)).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["views"], 1);
}

#[tokio::test]
async fn test_other_secret_cannot_read_cookie() {
    let writer = app(inline_manager());
    let reader = app(
        satchel_server::SessionManager::new(
            SessionOptions::new(),
            Some(b"ffffffffffffffffffffffffffffffff".as_slice()),
        )
        .unwrap(),
    );

    let first = send(&writer, "GET", "/views", None).await;
    let pair = first.cookie_pair(KEY).unwrap();
    let second = send(&reader, "GET", "/views", Some(&pair)).await;
    assert_eq!(second.body["views"], 1);
}

#[tokio::test]
async fn test_unsigned_sessions() {
    let manager = satchel_server::SessionManager::new(SessionOptions::new().with_signed(false), None)
        .unwrap();
    let app = app(manager);

    let first = send(&app, "GET", "/views", None).await;
    let pair = first.cookie_pair(KEY).unwrap();
    let second = send(&app, "GET", "/views", Some(&pair)).await;
    assert_eq!(second.body["views"], 2);
}

#[tokio::test]
async fn test_logout_clears_inline_cookie() {
    let app = app(inline_manager());

    let first = send(&app, "POST", "/user/alice", None).await;
    let pair = first.cookie_pair(KEY).unwrap();

    let logout = send(&app, "POST", "/logout", Some(&pair)).await;
    let removal = logout.cookie(KEY).unwrap();
    assert!(removal.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_external_store_round_trip() {
    let store = RecordingStore::new();
    let app = app(manager(
        SessionOptions::new()
            .with_max_age(Duration::from_secs(600))
            .with_store(store.clone()),
    ));

    let first = send(&app, "POST", "/user/alice", None).await;
    let pair = first.cookie_pair(KEY).unwrap();
    assert_eq!(store.inner().len(), 1);

    let peek = send(&app, "GET", "/peek", Some(&pair)).await;
    let id = peek.body["id"].as_str().unwrap().to_string();
    assert!(store.inner().contains(&id));
    assert_eq!(store.inner().peek(&id).unwrap()["user"], "alice");
    assert!(peek.set_cookies.is_empty());

    let logout = send(&app, "POST", "/logout", Some(&pair)).await;
    assert!(logout.cookie(KEY).unwrap().contains("Max-Age=0"));
    assert!(store.inner().is_empty());
}

#[tokio::test]
async fn test_regenerate_issues_new_identifier() {
    let store = RecordingStore::new();
    let app = app(manager(SessionOptions::new().with_store(store.clone())));

    let first = send(&app, "POST", "/user/alice", None).await;
    let pair = first.cookie_pair(KEY).unwrap();
    let old_id = send(&app, "GET", "/peek", Some(&pair)).await.body["id"]
        .as_str()
        .unwrap()
        .to_string();

    let rotated = send(&app, "POST", "/regenerate", Some(&pair)).await;
    let new_pair = rotated.cookie_pair(KEY).unwrap();
    assert_ne!(new_pair, pair);
    assert!(!store.inner().contains(&old_id));

    let peek = send(&app, "GET", "/peek", Some(&new_pair)).await;
    let new_id = peek.body["id"].as_str().unwrap();
    assert_ne!(new_id, old_id);
    assert_eq!(store.inner().peek(new_id).unwrap()["user"], "alice");
}

#[tokio::test]
async fn test_store_write_failure_returns_500() {
    let app = app(manager(SessionOptions::new().with_store(FailingStore::on_set())));

    let response = send(&app, "GET", "/views", None).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["code"], "storage_error");
    assert!(response.set_cookies.is_empty());
}

#[tokio::test]
async fn test_store_destroy_failure_returns_500() {
    let store = FailingStore::on_destroy();
    store
        .inner()
        .set("sid", &serde_json::json!({"user": "alice"}).as_object().cloned().unwrap(), None)
        .await
        .unwrap();
    let app = app(manager(
        SessionOptions::new()
            .with_signed(false)
            .with_store(store.clone()),
    ));

    let response = send(&app, "POST", "/logout", Some("koa:sess=sid")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["code"], "storage_error");
    assert!(response.set_cookies.is_empty());
    assert!(store.inner().contains("sid"));
}

#[tokio::test]
async fn test_handler_error_still_commits() {
    let app = app(inline_manager());

    let failed = send(&app, "POST", "/fail", None).await;
    assert_eq!(failed.status, StatusCode::BAD_REQUEST);
    assert_eq!(failed.body["code"], "bad_request");

    let pair = failed.cookie_pair(KEY).unwrap();
    let peek = send(&app, "GET", "/peek", Some(&pair)).await;
    assert_eq!(peek.body["views"], 1);
    assert_eq!(peek.body["is_new"], false);
}

#[tokio::test]
async fn test_store_read_failure_serves_fresh_session() {
    let app = app(manager(
        SessionOptions::new()
            .with_signed(false)
            .with_store(FailingStore::on_get()),
    ));

    let response = send(&app, "GET", "/views", Some("koa:sess=whatever")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["views"], 1);
}

#[tokio::test]
async fn test_manual_commit_without_auto_commit() {
    let app = app(manager(SessionOptions::new().with_auto_commit(false)));

    let dropped = send(&app, "GET", "/views", None).await;
    assert_eq!(dropped.status, StatusCode::OK);
    assert!(dropped.set_cookies.is_empty());

    let committed = send(&app, "POST", "/commit", None).await;
    assert_eq!(committed.body["decision"], "save (Changed)");
    assert!(committed.cookie(KEY).is_some());
}

#[tokio::test]
async fn test_reserved_key_is_rejected() {
    let app = app(inline_manager());

    let response = send(&app, "POST", "/reserved", None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "reserved_key");
}

#[tokio::test]
async fn test_missing_layer() {
    let app = app(inline_manager());

    let response = send(&app, "GET", "/bare", None).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["code"], "missing_session_layer");
}

#[tokio::test]
async fn test_header_external_key() {
    let store = RecordingStore::new();
    let app = app(manager(
        SessionOptions::new()
            .with_store(store.clone())
            .with_external_key(satchel_session::HeaderKey::new("x-session-id")),
    ));

    let first = send(&app, "GET", "/views", None).await;
    assert!(first.set_cookies.is_empty());
    let id = first.headers["x-session-id"].to_str().unwrap().to_string();
    assert!(store.inner().contains(&id));

    let request = Request::builder()
        .uri("/views")
        .header("x-session-id", &id)
        .body(Body::empty())
        .unwrap();
    let second = send_request(&app, request).await;
    assert_eq!(second.body["views"], 2);
}
