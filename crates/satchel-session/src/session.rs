//! The mutable, map-like session exposed to request handlers.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::data::{MaxAge, Metadata, SessionMap, is_reserved_key};
use crate::error::{Error, Result};

/// Session state for one request.
///
/// Handlers read and mutate the data freely; whether anything is written
/// back is decided once, when the request commits.
#[derive(Debug, Clone, Default)]
pub struct Session {
    data: SessionMap,
    is_new: bool,
    metadata: Metadata,
    max_age: Option<MaxAge>,
    invalidated: bool,
    regenerate: bool,
    force_save: bool,
}

impl Session {
    /// A fresh session with no prior state.
    pub fn new() -> Self {
        Self {
            is_new: true,
            ..Default::default()
        }
    }

    /// A session restored from a persisted payload.
    pub fn restore(data: SessionMap, metadata: Metadata) -> Self {
        Self {
            data,
            is_new: false,
            max_age: metadata.max_age,
            metadata,
            ..Default::default()
        }
    }

    /// Get a value, deserialized into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.data
            .get(key)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(Error::from)
    }

    /// Get the raw JSON value for a key.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set a value. Reserved metadata keys are rejected.
    pub fn set(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let key = key.into();
        if is_reserved_key(&key) {
            return Err(Error::ReservedKey(key));
        }
        let value = serde_json::to_value(value)?;
        self.data.insert(key, value);
        Ok(())
    }

    /// Remove a key, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Remove every key.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Replace the whole data map. `None` empties the session.
    ///
    /// Reserved metadata keys in the new map are dropped.
    pub fn replace(&mut self, data: Option<SessionMap>) {
        match data {
            None => self.data.clear(),
            Some(mut data) => {
                data.retain(|k, _| !is_reserved_key(k));
                self.data = data;
            }
        }
    }

    /// Borrow the data map.
    pub fn data(&self) -> &SessionMap {
        &self.data
    }

    /// Whether the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the session holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the session holds any keys.
    pub fn is_populated(&self) -> bool {
        !self.data.is_empty()
    }

    /// Whether no prior session existed when this one was loaded.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Destroy the session on commit, whatever else happens to it.
    pub fn mark_invalidate(&mut self) {
        self.invalidated = true;
    }

    /// Issue a new identifier on the next save, keeping the data.
    pub fn mark_regenerate(&mut self) {
        self.regenerate = true;
    }

    /// Save on commit even if nothing changed.
    pub fn save(&mut self) {
        self.force_save = true;
    }

    /// Whether [`Session::mark_invalidate`] was called.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// Whether [`Session::mark_regenerate`] was called.
    pub fn is_regenerate_requested(&self) -> bool {
        self.regenerate
    }

    /// Whether [`Session::save`] was called.
    pub fn is_save_forced(&self) -> bool {
        self.force_save
    }

    /// Lifetime override for this session, if any.
    pub fn max_age(&self) -> Option<MaxAge> {
        self.max_age
    }

    /// Override the lifetime used when this session is next saved.
    pub fn set_max_age(&mut self, max_age: MaxAge) {
        self.max_age = Some(max_age);
    }

    /// Expiry recorded when the session was loaded, epoch milliseconds.
    pub fn expires_at(&self) -> Option<i64> {
        self.metadata.expire
    }

    pub(crate) fn clear_flags(&mut self) {
        self.invalidated = false;
        self.regenerate = false;
        self.force_save = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Cart {
        items: Vec<String>,
    }

    #[test]
    fn test_new_session_is_new_and_empty() {
        let session = Session::new();
        assert!(session.is_new());
        assert!(session.is_empty());
        assert!(!session.is_populated());
        assert_eq!(session.max_age(), None);
    }

    #[test]
    fn test_typed_get_and_set() {
        let mut session = Session::new();
        session.set("views", 3).unwrap();
        session
            .set("cart", Cart { items: vec!["apple".into()] })
            .unwrap();

        assert_eq!(session.get::<u32>("views").unwrap(), Some(3));
        assert_eq!(
            session.get::<Cart>("cart").unwrap(),
            Some(Cart { items: vec!["apple".into()] })
        );
        assert_eq!(session.get::<u32>("missing").unwrap(), None);
        assert!(session.get::<u32>("cart").is_err());
    }

    #[test]
    fn test_reserved_key_rejected() {
        let mut session = Session::new();
        let err = session.set("_expire", 0).unwrap_err();
        assert!(matches!(err, Error::ReservedKey(k) if k == "_expire"));
        assert!(session.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut session = Session::new();
        session.set("a", 1).unwrap();
        session.set("b", 2).unwrap();

        assert_eq!(session.remove("a"), Some(json!(1)));
        assert_eq!(session.remove("a"), None);
        assert_eq!(session.len(), 1);

        session.clear();
        assert!(session.is_empty());
    }

    #[test]
    fn test_replace() {
        let mut session = Session::new();
        session.set("a", 1).unwrap();

        let replacement = json!({"b": 2, "_maxAge": 5}).as_object().cloned();
        session.replace(replacement);
        assert!(!session.contains_key("a"));
        assert!(session.contains_key("b"));
        assert!(!session.contains_key("_maxAge"));

        session.replace(None);
        assert!(session.is_empty());
    }

    #[test]
    fn test_restore_carries_metadata() {
        let data = json!({"user": "a"}).as_object().cloned().unwrap();
        let metadata = Metadata {
            expire: Some(42),
            max_age: Some(MaxAge::After(Duration::from_secs(60))),
        };
        let session = Session::restore(data, metadata);

        assert!(!session.is_new());
        assert_eq!(session.expires_at(), Some(42));
        assert_eq!(
            session.max_age(),
            Some(MaxAge::After(Duration::from_secs(60)))
        );
    }

    #[test]
    fn test_flags() {
        let mut session = Session::new();
        session.mark_invalidate();
        session.mark_regenerate();
        session.save();
        assert!(session.is_invalidated());
        assert!(session.is_regenerate_requested());
        assert!(session.is_save_forced());

        session.clear_flags();
        assert!(!session.is_invalidated());
        assert!(!session.is_regenerate_requested());
        assert!(!session.is_save_forced());
    }
}
