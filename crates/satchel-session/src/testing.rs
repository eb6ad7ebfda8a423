//! Test doubles for exercising the engine without an HTTP stack.
//!
//! Enabled for this crate's own tests and, for downstream crates, with the
//! `testing` feature.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::context::{CookieAttributes, RequestContext};
use crate::data::SessionMap;
use crate::error::{Error, Result};
use crate::store::{MemoryStore, SessionStore};

/// A cookie written to the mock response. `value` is `None` for removals.
#[derive(Debug, Clone, PartialEq)]
pub struct SetCookie {
    pub name: String,
    pub value: Option<String>,
    pub attrs: CookieAttributes,
}

/// In-memory [`RequestContext`].
///
/// Signing is not simulated: a cookie added with [`MockContext::with_cookie`]
/// reads back the same whether or not `signed` is requested.
#[derive(Debug, Clone, Default)]
pub struct MockContext {
    cookies: HashMap<String, String>,
    headers: HashMap<String, String>,
    set_cookies: Vec<SetCookie>,
    response_headers: HashMap<String, String>,
}

impl MockContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Cookies written to the response, in write order.
    pub fn set_cookies(&self) -> &[SetCookie] {
        &self.set_cookies
    }

    /// The last cookie written under `name`.
    pub fn response_cookie(&self, name: &str) -> Option<&SetCookie> {
        self.set_cookies.iter().rev().find(|c| c.name == name)
    }

    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response_headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The context a browser would send next: request cookies updated by
    /// this response's cookies. Headers are not carried over.
    pub fn next_request(&self) -> MockContext {
        let mut cookies = self.cookies.clone();
        for cookie in &self.set_cookies {
            match &cookie.value {
                Some(value) => {
                    cookies.insert(cookie.name.clone(), value.clone());
                }
                None => {
                    cookies.remove(&cookie.name);
                }
            }
        }
        MockContext {
            cookies,
            ..Default::default()
        }
    }

    fn push_cookie(&mut self, cookie: SetCookie) {
        if cookie.attrs.overwrite {
            self.set_cookies.retain(|c| c.name != cookie.name);
        }
        self.set_cookies.push(cookie);
    }
}

impl RequestContext for MockContext {
    fn cookie(&self, name: &str, _signed: bool) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    fn set_cookie(&mut self, name: &str, value: &str, attrs: &CookieAttributes) {
        self.push_cookie(SetCookie {
            name: name.to_string(),
            value: Some(value.to_string()),
            attrs: attrs.clone(),
        });
    }

    fn remove_cookie(&mut self, name: &str, attrs: &CookieAttributes) {
        self.push_cookie(SetCookie {
            name: name.to_string(),
            value: None,
            attrs: attrs.clone(),
        });
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers.get(&name.to_ascii_lowercase()).cloned()
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.response_headers
            .insert(name.to_ascii_lowercase(), value.to_string());
    }
}

/// A store call observed by [`RecordingStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Get(String),
    Set {
        id: String,
        payload: SessionMap,
        ttl: Option<Duration>,
    },
    Destroy(String),
}

/// Wraps a [`MemoryStore`] and records every call.
#[derive(Clone, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    calls: Arc<Mutex<Vec<StoreCall>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped store, for seeding and inspection.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Only the `set` calls.
    pub fn sets(&self) -> Vec<StoreCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, StoreCall::Set { .. }))
            .cloned()
            .collect()
    }

    /// Whether anything other than `get` was called.
    pub fn was_written(&self) -> bool {
        self.calls
            .lock()
            .iter()
            .any(|c| !matches!(c, StoreCall::Get(_)))
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn get(&self, id: &str) -> Result<Option<SessionMap>> {
        self.calls.lock().push(StoreCall::Get(id.to_string()));
        self.inner.get(id).await
    }

    async fn set(&self, id: &str, payload: &SessionMap, ttl: Option<Duration>) -> Result<()> {
        self.calls.lock().push(StoreCall::Set {
            id: id.to_string(),
            payload: payload.clone(),
            ttl,
        });
        self.inner.set(id, payload, ttl).await
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        self.calls.lock().push(StoreCall::Destroy(id.to_string()));
        self.inner.destroy(id).await
    }
}

/// A store whose operations fail on demand.
#[derive(Clone, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_get: bool,
    fail_set: bool,
    fail_destroy: bool,
}

impl FailingStore {
    /// Only `get` fails.
    pub fn on_get() -> Self {
        Self {
            fail_get: true,
            ..Default::default()
        }
    }

    /// Only `set` fails.
    pub fn on_set() -> Self {
        Self {
            fail_set: true,
            ..Default::default()
        }
    }

    /// Only `destroy` fails.
    pub fn on_destroy() -> Self {
        Self {
            fail_destroy: true,
            ..Default::default()
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl SessionStore for FailingStore {
    async fn get(&self, id: &str) -> Result<Option<SessionMap>> {
        if self.fail_get {
            return Err(Error::Store("connection refused".to_string()));
        }
        self.inner.get(id).await
    }

    async fn set(&self, id: &str, payload: &SessionMap, ttl: Option<Duration>) -> Result<()> {
        if self.fail_set {
            return Err(Error::Store("connection refused".to_string()));
        }
        self.inner.set(id, payload, ttl).await
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        if self.fail_destroy {
            return Err(Error::Store("connection refused".to_string()));
        }
        self.inner.destroy(id).await
    }
}
