//! Session middleware.

use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
};
use tracing::trace;

use crate::context::HttpContext;
use crate::error::ServerError;
use crate::handle::SessionHandle;
use crate::state::SessionManager;

/// Session middleware function.
///
/// Installs a [`SessionHandle`] in request extensions, runs the handler,
/// commits when `auto_commit` is on and writes the resulting cookies and
/// headers onto the response. A failed commit replaces the response with a
/// 500 error.
pub async fn session_middleware(
    State(manager): State<SessionManager>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let ctx = HttpContext::new(request.headers().clone(), manager.key().cloned());
    let handle = SessionHandle::new(manager.engine().begin(&ctx), ctx);

    request.extensions_mut().insert(handle.clone());
    let mut response = next.run(request).await;

    if manager.options().auto_commit {
        let decision = handle.commit().await?;
        trace!(decision = %decision, "Session auto-committed");
    }

    handle.write_headers(response.headers_mut()).await;
    Ok(response)
}

/// Wrap every route of `router` with [`session_middleware`].
pub fn with_sessions<S>(router: Router<S>, manager: SessionManager) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(manager, session_middleware))
}
