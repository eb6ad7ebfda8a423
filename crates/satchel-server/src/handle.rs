//! Handler-side access to the request's session.

use std::ops::Deref;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use satchel_session::{
    CommitDecision, MaxAge, RequestSession, Session as SessionData, SessionMap, SessionOptions,
};

use crate::context::HttpContext;
use crate::error::{Result, ServerError};

struct SessionSlot {
    request: RequestSession,
    ctx: HttpContext,
}

/// Shared handle to the current request's session.
///
/// Cloned into request extensions by [`session_middleware`]. The session is
/// loaded on first use; methods that only inspect commit state do not load.
///
/// [`session_middleware`]: crate::session_middleware
#[derive(Clone)]
pub struct SessionHandle {
    slot: Arc<Mutex<SessionSlot>>,
    options: Arc<SessionOptions>,
}

impl SessionHandle {
    pub(crate) fn new(request: RequestSession, ctx: HttpContext) -> Self {
        let options = Arc::clone(request.options());
        Self {
            slot: Arc::new(Mutex::new(SessionSlot { request, ctx })),
            options,
        }
    }

    async fn with_session<R>(&self, f: impl FnOnce(&mut SessionData) -> R) -> R {
        let mut guard = self.slot.lock().await;
        let SessionSlot { request, ctx } = &mut *guard;
        f(request.load(&*ctx).await)
    }

    /// Get a value, deserialized into `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Ok(self.with_session(|s| s.get(key)).await?)
    }

    pub async fn get_value(&self, key: &str) -> Option<Value> {
        self.with_session(|s| s.get_value(key).cloned()).await
    }

    /// Set a value. Reserved metadata keys are rejected.
    pub async fn set(&self, key: &str, value: impl Serialize + Send) -> Result<()> {
        Ok(self.with_session(|s| s.set(key, value)).await?)
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.with_session(|s| s.remove(key)).await
    }

    /// Remove all data. An existing session is destroyed on commit.
    pub async fn clear(&self) {
        self.with_session(|s| s.clear()).await
    }

    /// Replace all data; `None` empties the session.
    pub async fn replace(&self, data: Option<SessionMap>) {
        self.with_session(|s| s.replace(data)).await
    }

    /// A copy of the current data.
    pub async fn data(&self) -> SessionMap {
        self.with_session(|s| s.data().clone()).await
    }

    pub async fn len(&self) -> usize {
        self.with_session(|s| s.len()).await
    }

    pub async fn is_empty(&self) -> bool {
        self.with_session(|s| s.is_empty()).await
    }

    /// Whether no prior session was loaded.
    pub async fn is_new(&self) -> bool {
        self.with_session(|s| s.is_new()).await
    }

    pub async fn is_populated(&self) -> bool {
        self.with_session(|s| s.is_populated()).await
    }

    /// Whether the data differs from what was loaded. False before first use.
    pub async fn is_changed(&self) -> bool {
        self.slot.lock().await.request.is_changed()
    }

    /// Destroy the session on commit, whatever else happened.
    pub async fn invalidate(&self) {
        self.with_session(|s| s.mark_invalidate()).await
    }

    /// Move the data to a new identifier on commit.
    pub async fn regenerate(&self) {
        self.with_session(|s| s.mark_regenerate()).await
    }

    /// Save on commit even if nothing changed.
    pub async fn save(&self) {
        self.with_session(|s| s.save()).await
    }

    /// The lifetime this session will be saved with.
    pub async fn max_age(&self) -> MaxAge {
        let default = self.options.max_age;
        self.with_session(|s| s.max_age().unwrap_or(default)).await
    }

    pub async fn set_max_age(&self, max_age: MaxAge) {
        self.with_session(|s| s.set_max_age(max_age)).await
    }

    /// Identifier of the stored session. Always `None` for inline sessions
    /// and for new sessions until they are committed.
    pub async fn id(&self) -> Option<String> {
        let mut guard = self.slot.lock().await;
        let SessionSlot { request, ctx } = &mut *guard;
        request.load(&*ctx).await;
        request.id().map(str::to_string)
    }

    /// The decision a commit would execute right now.
    pub async fn decision(&self) -> CommitDecision {
        self.slot.lock().await.request.decision()
    }

    /// Commit now. Needed when `auto_commit` is off; later commits in the
    /// same request are no-ops.
    pub async fn commit(&self) -> Result<CommitDecision> {
        let mut guard = self.slot.lock().await;
        let SessionSlot { request, ctx } = &mut *guard;
        Ok(request.commit(ctx).await?)
    }

    pub async fn is_committed(&self) -> bool {
        self.slot.lock().await.request.is_committed()
    }

    /// The options this session runs with.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub(crate) async fn write_headers(&self, headers: &mut HeaderMap) {
        self.slot.lock().await.ctx.write_headers(headers);
    }
}

/// Extractor for the current request's session.
///
/// Fails with [`ServerError::MissingLayer`] when the route is not wrapped
/// by [`session_middleware`](crate::session_middleware).
#[derive(Clone)]
pub struct Session(pub SessionHandle);

impl Deref for Session {
    type Target = SessionHandle;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .map(Session)
            .ok_or(ServerError::MissingLayer)
    }
}
