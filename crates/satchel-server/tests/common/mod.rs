//! Common test utilities for integration tests.

#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Body,
    extract::Path,
    http::{Request, StatusCode, header},
    routing::{get, post},
};
use serde_json::Value;
use tower::ServiceExt;

use satchel_server::{Result, ServerError, Session, SessionManager, with_sessions};
use satchel_session::SessionOptions;

pub const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

/// Response as seen by a test client.
pub struct TestResponse {
    pub status: StatusCode,
    pub set_cookies: Vec<String>,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// The `Set-Cookie` header for `name`, if any.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        let prefix = format!("{}=", name);
        self.set_cookies
            .iter()
            .find(|c| c.starts_with(&prefix))
            .map(String::as_str)
    }

    /// `name=value` of the cookie, ready for a `Cookie` request header.
    pub fn cookie_pair(&self, name: &str) -> Option<String> {
        self.cookie(name)
            .and_then(|c| c.split(';').next())
            .map(str::to_string)
    }
}

async fn views(session: Session) -> Result<Json<Value>> {
    let views: u64 = session.get("views").await?.unwrap_or(0) + 1;
    session.set("views", views).await?;
    Ok(Json(serde_json::json!({ "views": views })))
}

async fn peek(session: Session) -> Json<Value> {
    Json(serde_json::json!({
        "views": session.get_value("views").await,
        "is_new": session.is_new().await,
        "id": session.id().await,
    }))
}

async fn set_user(session: Session, Path(user): Path<String>) -> Result<Json<Value>> {
    session.set("user", &user).await?;
    Ok(Json(serde_json::json!({ "user": user })))
}

async fn set_reserved(session: Session) -> Result<Json<Value>> {
    session.set("_expire", 0).await?;
    Ok(Json(Value::Null))
}

async fn set_then_fail(session: Session) -> Result<Json<Value>> {
    session.set("views", 1).await?;
    Err(ServerError::BadRequest("rejected after writing".to_string()))
}

async fn logout(session: Session) -> Json<Value> {
    session.invalidate().await;
    Json(Value::Null)
}

async fn regenerate(session: Session) -> Json<Value> {
    session.regenerate().await;
    Json(Value::Null)
}

async fn commit_now(session: Session) -> Result<Json<Value>> {
    session.set("committed", true).await?;
    let decision = session.commit().await?;
    Ok(Json(serde_json::json!({ "decision": decision.to_string() })))
}

async fn unsessioned(session: Session) -> Json<Value> {
    Json(serde_json::json!({ "new": session.is_new().await }))
}

/// Test application wrapped with the session layer.
pub fn app(manager: SessionManager) -> Router {
    let routes = Router::new()
        .route("/views", get(views))
        .route("/peek", get(peek))
        .route("/user/{name}", post(set_user))
        .route("/reserved", post(set_reserved))
        .route("/fail", post(set_then_fail))
        .route("/logout", post(logout))
        .route("/regenerate", post(regenerate))
        .route("/commit", post(commit_now));

    with_sessions(routes, manager).route("/bare", get(unsessioned))
}

/// Signed inline-cookie manager with default options.
pub fn inline_manager() -> SessionManager {
    manager(SessionOptions::new())
}

pub fn manager(options: SessionOptions) -> SessionManager {
    SessionManager::new(options, Some(SECRET)).unwrap()
}

/// Send one request, optionally with a `Cookie` header.
pub async fn send(app: &Router, method: &str, uri: &str, cookie: Option<&str>) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    send_request(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn send_request(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let set_cookies = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    TestResponse {
        status,
        set_cookies,
        headers,
        body,
    }
}
