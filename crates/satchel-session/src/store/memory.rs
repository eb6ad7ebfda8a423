//! In-process session store with LRU eviction and per-record TTL.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::SessionStore;
use super::ttl::DeadlineTracker;
use crate::data::SessionMap;
use crate::error::Result;

/// Default maximum number of stored sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Default interval for the background cleanup task.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Maximum number of records before the least recently used is evicted.
    pub max_sessions: usize,

    /// Interval for [`MemoryStore::spawn_cleanup_task`].
    pub cleanup_interval: Duration,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl MemoryStoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of stored sessions.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Set the cleanup interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

struct StoreInner {
    lru: LruCache<String, SessionMap>,
    deadlines: DeadlineTracker,
}

impl StoreInner {
    fn purge(&mut self, id: &str) {
        self.lru.pop(id);
        self.deadlines.remove(id);
    }
}

/// Session store kept in process memory.
///
/// Intended for development, tests and single-instance deployments. Records
/// vanish on restart and are not shared between processes.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
    config: MemoryStoreConfig,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryStoreConfig::default())
    }
}

impl MemoryStore {
    pub fn new(config: MemoryStoreConfig) -> Self {
        let cap = NonZeroUsize::new(config.max_sessions).unwrap_or(NonZeroUsize::MIN);
        let inner = StoreInner {
            lru: LruCache::new(cap),
            deadlines: DeadlineTracker::new(),
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
            config,
        }
    }

    pub fn config(&self) -> &MemoryStoreConfig {
        &self.config
    }

    /// Number of stored records, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    /// Whether a live record exists, without touching LRU order.
    pub fn contains(&self, id: &str) -> bool {
        let inner = self.inner.lock();
        inner.lru.contains(id) && !inner.deadlines.is_expired(id)
    }

    /// Peek at a live record without touching LRU order.
    pub fn peek(&self, id: &str) -> Option<SessionMap> {
        let inner = self.inner.lock();
        if inner.deadlines.is_expired(id) {
            None
        } else {
            inner.lru.peek(id).cloned()
        }
    }

    /// Remove expired records and return how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let expired = inner.deadlines.drain_expired();
        for id in &expired {
            inner.lru.pop(id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "Cleaned up expired sessions");
        }
        expired.len()
    }

    /// Run [`MemoryStore::cleanup_expired`] every `cleanup_interval`.
    ///
    /// Must be called from within a tokio runtime. Abort the returned handle
    /// to stop the task.
    pub fn spawn_cleanup_task(&self) -> JoinHandle<()> {
        let store = self.clone();
        let interval = self.config.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.cleanup_expired();
            }
        })
    }

    pub fn stats(&self) -> MemoryStoreStats {
        let inner = self.inner.lock();
        MemoryStoreStats {
            size: inner.lru.len(),
            capacity: self.config.max_sessions,
            with_deadline: inner.deadlines.len(),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<SessionMap>> {
        let mut inner = self.inner.lock();
        if inner.deadlines.is_expired(id) {
            debug!(session_id = %id, "Stored session expired, removing");
            inner.purge(id);
            return Ok(None);
        }
        let found = inner.lru.get(id).cloned();
        trace!(session_id = %id, hit = found.is_some(), "Memory store lookup");
        Ok(found)
    }

    async fn set(&self, id: &str, payload: &SessionMap, ttl: Option<Duration>) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some((evicted, _)) = inner.lru.push(id.to_string(), payload.clone())
            && evicted != id
        {
            debug!(session_id = %evicted, "Evicting LRU session to make room");
            inner.deadlines.remove(&evicted);
        }
        inner.deadlines.touch(id, ttl);
        trace!(session_id = %id, size = inner.lru.len(), "Session stored");
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        self.inner.lock().purge(id);
        trace!(session_id = %id, "Session destroyed");
        Ok(())
    }
}

/// Memory store statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStoreStats {
    /// Current number of records.
    pub size: usize,

    /// Maximum capacity.
    pub capacity: usize,

    /// Number of records with a deadline.
    pub with_deadline: usize,
}
