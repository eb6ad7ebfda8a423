//! Session payload layout: user data plus out-of-band metadata.
//!
//! A persisted payload is a single JSON object. User keys sit next to a few
//! reserved metadata keys that never surface through [`Session`](crate::Session):
//!
//! | Key | Meaning |
//! |---|---|
//! | `_expire` | absolute expiry, epoch milliseconds |
//! | `_maxAge` | lifetime the session was saved with, milliseconds |
//! | `_session` | `true` when saved with browser-session lifetime |

use std::time::Duration;

use serde_json::Value;

/// String-keyed map of JSON values held by a session.
pub type SessionMap = serde_json::Map<String, Value>;

/// Metadata key for the absolute expiry timestamp.
pub const EXPIRE_KEY: &str = "_expire";

/// Metadata key for the saved lifetime.
pub const MAX_AGE_KEY: &str = "_maxAge";

/// Metadata key marking a browser-session lifetime.
pub const SESSION_KEY: &str = "_session";

const RESERVED_KEYS: [&str; 3] = [EXPIRE_KEY, MAX_AGE_KEY, SESSION_KEY];

/// Whether `key` is reserved for session metadata.
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// How long a saved session lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxAge {
    /// Lives until the browser session ends; no expiry is recorded.
    Session,
    /// Expires this long after the save that wrote it.
    After(Duration),
}

impl MaxAge {
    /// Lifetime in whole milliseconds, or `None` for browser-session lifetime.
    pub fn as_millis(&self) -> Option<i64> {
        match self {
            MaxAge::Session => None,
            MaxAge::After(d) => Some(i64::try_from(d.as_millis()).unwrap_or(i64::MAX)),
        }
    }

    /// The lifetime as a duration, if bounded.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            MaxAge::Session => None,
            MaxAge::After(d) => Some(*d),
        }
    }
}

impl Default for MaxAge {
    fn default() -> Self {
        MaxAge::After(crate::config::DEFAULT_MAX_AGE)
    }
}

/// Metadata recovered from a persisted payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    /// Absolute expiry in epoch milliseconds.
    pub expire: Option<i64>,
    /// Lifetime recorded at the last save.
    pub max_age: Option<MaxAge>,
}

impl Metadata {
    /// Whether the recorded expiry lies before `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.expire, Some(expire) if expire < now_ms)
    }
}

/// Split a decoded payload into user data and metadata.
///
/// Returns `None` when a metadata key is present with the wrong type.
pub fn split_payload(mut payload: SessionMap) -> Option<(SessionMap, Metadata)> {
    let expire = match payload.remove(EXPIRE_KEY) {
        None => None,
        Some(value) => Some(value.as_i64()?),
    };
    let max_age_ms = match payload.remove(MAX_AGE_KEY) {
        None => None,
        Some(value) => Some(value.as_u64()?),
    };
    let browser_session = match payload.remove(SESSION_KEY) {
        None => false,
        Some(value) => value.as_bool()?,
    };

    let max_age = if browser_session {
        Some(MaxAge::Session)
    } else {
        max_age_ms.map(|ms| MaxAge::After(Duration::from_millis(ms)))
    };

    Some((payload, Metadata { expire, max_age }))
}

/// Attach metadata for a save at `now_ms` to a copy of the user data.
pub fn join_payload(data: &SessionMap, max_age: MaxAge, now_ms: i64) -> SessionMap {
    let mut payload = data.clone();
    match max_age.as_millis() {
        None => {
            payload.insert(SESSION_KEY.to_string(), Value::Bool(true));
        }
        Some(ms) => {
            payload.insert(EXPIRE_KEY.to_string(), Value::from(now_ms.saturating_add(ms)));
            payload.insert(MAX_AGE_KEY.to_string(), Value::from(ms));
        }
    }
    payload
}
