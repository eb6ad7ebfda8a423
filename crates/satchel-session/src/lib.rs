//! Per-request session lifecycle engine.
//!
//! This crate provides the framework-independent part of cookie sessions:
//! - A map-like [`Session`] handed to request handlers
//! - Dirty tracking against a load-time [`Snapshot`]
//! - A [`CommitDecision`] executed once per request
//! - Inline persistence (the payload is the cookie) or an external
//!   [`SessionStore`] keyed by an identifier carried in the cookie or an
//!   [`ExternalKey`]
//!
//! The host framework supplies a [`RequestContext`] for cookie and header
//! access; `satchel-server` does this for axum.
//!
//! # Example
//!
//! ```rust,ignore
//! use satchel_session::{MemoryStore, SessionEngine, SessionOptions};
//!
//! let engine = SessionEngine::new(
//!     SessionOptions::new()
//!         .with_max_age(Duration::from_secs(3600))
//!         .with_store(MemoryStore::default()),
//! )?;
//!
//! let mut slot = engine.begin(&ctx);
//! slot.load(&ctx).await.set("views", 1)?;
//! slot.commit(&mut ctx).await?;
//! ```

mod backend;
mod codec;
mod config;
mod context;
mod data;
mod decision;
mod engine;
mod error;
mod external_key;
mod session;
mod snapshot;
mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{MAX_COOKIE_BYTES, STORE_TTL_MARGIN};
pub use codec::{Codec, JsonCodec, canonical};
pub use config::{
    BeforeSaveHook, DEFAULT_KEY, DEFAULT_MAX_AGE, EventListener, GenId, MaxAgeSetting,
    SessionOptions, SessionSettings, ValidHook,
};
pub use context::{CookieAttributes, RequestContext, SameSite};
pub use data::{EXPIRE_KEY, MAX_AGE_KEY, MaxAge, Metadata, SESSION_KEY, SessionMap};
pub use decision::{CommitDecision, RefreshPolicy, SaveReason, decide};
pub use engine::{RequestSession, SessionEngine, SessionEvent};
pub use error::{Error, Result};
pub use external_key::{ExternalKey, HeaderKey};
pub use session::Session;
pub use snapshot::Snapshot;
pub use store::{
    ContextStoreFactory, DEFAULT_CLEANUP_INTERVAL, DEFAULT_MAX_SESSIONS, DeadlineTracker, MemoryStore, MemoryStoreConfig, MemoryStoreStats,
    SessionStore, StoreSource,
};
