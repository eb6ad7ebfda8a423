//! Demo routes.

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use satchel_server::{Result, ServerError, Session, SessionManager, with_sessions};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewsResponse {
    pub views: u64,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Count views of this session.
pub async fn views(session: Session) -> Result<Json<ViewsResponse>> {
    let views = session.get::<u64>("views").await?.unwrap_or(0) + 1;
    session.set("views", views).await?;
    Ok(Json(ViewsResponse { views }))
}

/// Log in: move the session to a fresh identifier and record the user.
pub async fn login(session: Session, Json(request): Json<LoginRequest>) -> Result<Json<UserResponse>> {
    let user = request.user.trim();
    if user.is_empty() {
        return Err(ServerError::BadRequest("user must not be empty".to_string()));
    }

    session.regenerate().await;
    session.set("user", user).await?;
    info!(user, "User logged in");

    Ok(Json(UserResponse {
        user: user.to_string(),
    }))
}

pub async fn whoami(session: Session) -> Result<Json<UserResponse>> {
    match session.get::<String>("user").await? {
        Some(user) => Ok(Json(UserResponse { user })),
        None => Err(ServerError::Unauthorized("not logged in".to_string())),
    }
}

pub async fn logout(session: Session) -> Json<serde_json::Value> {
    session.invalidate().await;
    Json(serde_json::json!({ "ok": true }))
}

/// Build the demo router.
pub fn router(manager: SessionManager) -> Router {
    let session_routes = Router::new()
        .route("/", get(views))
        .route("/login", post(login))
        .route("/whoami", get(whoami))
        .route("/logout", post(logout));

    with_sessions(session_routes, manager)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
}
