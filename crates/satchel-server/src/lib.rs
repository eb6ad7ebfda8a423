//! axum integration for satchel sessions.
//!
//! Wraps routes with [`session_middleware`], which gives every request a
//! lazily loaded session and commits it after the handler returns.
//!
//! # Example
//!
//! ```ignore
//! use satchel_server::{Session, SessionManager, with_sessions};
//! use satchel_session::SessionOptions;
//!
//! async fn views(session: Session) -> satchel_server::Result<String> {
//!     let views: u64 = session.get("views").await?.unwrap_or(0) + 1;
//!     session.set("views", views).await?;
//!     Ok(views.to_string())
//! }
//!
//! let manager = SessionManager::new(SessionOptions::new(), Some(secret.as_bytes()))?;
//! let app = with_sessions(Router::new().route("/", get(views)), manager);
//! ```

pub mod context;
pub mod error;
pub mod handle;
pub mod middleware;
pub mod state;

pub use context::HttpContext;
pub use error::{ErrorResponse, Result, ServerError};
pub use handle::{Session, SessionHandle};
pub use middleware::{session_middleware, with_sessions};
pub use state::{MIN_SECRET_LEN, SessionManager};
