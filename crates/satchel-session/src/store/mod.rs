//! External session stores.
//!
//! In external mode the cookie only carries an identifier and the payload
//! lives in a [`SessionStore`]. Stores are shared across requests; requests
//! for different identifiers must not interfere. Two requests writing the
//! same identifier race, and the last write wins.

mod memory;
mod ttl;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::data::SessionMap;
use crate::error::Result;

pub use memory::{
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_MAX_SESSIONS, MemoryStore, MemoryStoreConfig, MemoryStoreStats,
};
pub use ttl::DeadlineTracker;

/// Trait for external session stores.
///
/// Implement this trait to keep session payloads in your own backend
/// (Redis, a database, ...). The payload includes the session metadata keys.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Fetch the payload for an identifier.
    ///
    /// Return `Ok(None)` if the identifier is unknown or expired. `Err` is
    /// reserved for infrastructure failures.
    async fn get(&self, id: &str) -> Result<Option<SessionMap>>;

    /// Store the payload for an identifier.
    ///
    /// `ttl` is how long the store should keep the record; `None` means the
    /// session has browser-session lifetime and the store picks its own bound.
    async fn set(&self, id: &str, payload: &SessionMap, ttl: Option<Duration>) -> Result<()>;

    /// Delete the payload for an identifier. Unknown identifiers succeed.
    async fn destroy(&self, id: &str) -> Result<()>;
}

#[async_trait]
impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    async fn get(&self, id: &str) -> Result<Option<SessionMap>> {
        (**self).get(id).await
    }

    async fn set(&self, id: &str, payload: &SessionMap, ttl: Option<Duration>) -> Result<()> {
        (**self).set(id, payload, ttl).await
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        (**self).destroy(id).await
    }
}

/// Builds a store for each request.
///
/// Useful when the store needs something from the request, such as a
/// tenant header selecting a database.
pub trait ContextStoreFactory: Send + Sync + 'static {
    fn create(&self, ctx: &dyn RequestContext) -> Arc<dyn SessionStore>;
}

impl<F> ContextStoreFactory for F
where
    F: Fn(&dyn RequestContext) -> Arc<dyn SessionStore> + Send + Sync + 'static,
{
    fn create(&self, ctx: &dyn RequestContext) -> Arc<dyn SessionStore> {
        self(ctx)
    }
}

/// Where the external store comes from.
#[derive(Clone)]
pub enum StoreSource {
    /// One store shared by every request.
    Shared(Arc<dyn SessionStore>),
    /// A store built per request.
    PerRequest(Arc<dyn ContextStoreFactory>),
}

impl StoreSource {
    /// The store to use for this request.
    pub fn resolve(&self, ctx: &dyn RequestContext) -> Arc<dyn SessionStore> {
        match self {
            StoreSource::Shared(store) => Arc::clone(store),
            StoreSource::PerRequest(factory) => factory.create(ctx),
        }
    }
}

impl std::fmt::Debug for StoreSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreSource::Shared(_) => write!(f, "StoreSource::Shared"),
            StoreSource::PerRequest(_) => write!(f, "StoreSource::PerRequest"),
        }
    }
}
