//! Session options.
//!
//! [`SessionOptions`] is built in code with `with_*` methods. Deployments that
//! configure sessions from a file use [`SessionSettings`], the plain-data
//! subset, and convert it with [`SessionOptions::from_settings`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::{Codec, JsonCodec};
use crate::context::{CookieAttributes, SameSite};
use crate::data::{MaxAge, SessionMap};
use crate::decision::RefreshPolicy;
use crate::engine::SessionEvent;
use crate::error::{Error, Result};
use crate::external_key::{ExternalKey, HeaderKey};
use crate::session::Session;
use crate::store::{ContextStoreFactory, MemoryStore, MemoryStoreConfig, SessionStore};

/// Default session cookie name.
pub const DEFAULT_KEY: &str = "koa:sess";

/// Default session lifetime (one day).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Generates session identifiers.
pub type GenId = Arc<dyn Fn() -> String + Send + Sync>;

/// Decides whether loaded session data is acceptable.
pub type ValidHook = Arc<dyn Fn(&SessionMap) -> bool + Send + Sync>;

/// Runs right before a session is saved.
pub type BeforeSaveHook = Arc<dyn Fn(&mut Session) + Send + Sync>;

/// Receives load-time session events.
pub type EventListener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Options for the session engine.
#[derive(Clone)]
pub struct SessionOptions {
    /// Cookie name for the payload (inline) or the identifier (external).
    pub key: String,

    /// Default lifetime of saved sessions.
    pub max_age: MaxAge,

    /// Later writes of the session cookie replace earlier ones.
    pub overwrite: bool,

    pub http_only: bool,

    /// Sign the session cookie.
    pub signed: bool,

    pub secure: bool,

    pub same_site: Option<SameSite>,

    pub path: String,

    pub domain: Option<String>,

    /// Commit automatically after every request.
    pub auto_commit: bool,

    /// Resave every populated session, refreshing its expiry.
    pub rolling: bool,

    /// Resave sessions with less than half their lifetime left.
    pub renew: bool,

    /// Shared external store. Enables external mode.
    pub store: Option<Arc<dyn SessionStore>>,

    /// Per-request store factory. Enables external mode.
    pub context_store: Option<Arc<dyn ContextStoreFactory>>,

    /// Identifier transport used instead of the cookie.
    pub external_key: Option<Arc<dyn ExternalKey>>,

    /// Custom identifier generator. Overrides `prefix`.
    pub genid: Option<GenId>,

    /// Prefix for identifiers from the default generator.
    pub prefix: Option<String>,

    pub codec: Arc<dyn Codec>,

    pub valid: Option<ValidHook>,

    pub before_save: Option<BeforeSaveHook>,

    pub on_event: Option<EventListener>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            max_age: MaxAge::After(DEFAULT_MAX_AGE),
            overwrite: true,
            http_only: true,
            signed: true,
            secure: false,
            same_site: None,
            path: "/".to_string(),
            domain: None,
            auto_commit: true,
            rolling: false,
            renew: false,
            store: None,
            context_store: None,
            external_key: None,
            genid: None,
            prefix: None,
            codec: Arc::new(JsonCodec),
            valid: None,
            before_save: None,
            on_event: None,
        }
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("key", &self.key)
            .field("max_age", &self.max_age)
            .field("overwrite", &self.overwrite)
            .field("http_only", &self.http_only)
            .field("signed", &self.signed)
            .field("secure", &self.secure)
            .field("same_site", &self.same_site)
            .field("path", &self.path)
            .field("domain", &self.domain)
            .field("auto_commit", &self.auto_commit)
            .field("rolling", &self.rolling)
            .field("renew", &self.renew)
            .field("store", &self.store.is_some())
            .field("context_store", &self.context_store.is_some())
            .field("external_key", &self.external_key.is_some())
            .field("genid", &self.genid.is_some())
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cookie name.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Set the default session lifetime.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = MaxAge::After(max_age);
        self
    }

    /// Use browser-session cookies with no recorded expiry.
    pub fn with_session_cookie(mut self) -> Self {
        self.max_age = MaxAge::Session;
        self
    }

    pub fn with_overwrite(mut self, enabled: bool) -> Self {
        self.overwrite = enabled;
        self
    }

    pub fn with_http_only(mut self, enabled: bool) -> Self {
        self.http_only = enabled;
        self
    }

    pub fn with_signed(mut self, enabled: bool) -> Self {
        self.signed = enabled;
        self
    }

    pub fn with_secure(mut self, enabled: bool) -> Self {
        self.secure = enabled;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Enable or disable committing after every request.
    ///
    /// When disabled, handlers must commit explicitly before the response is
    /// sent; uncommitted changes are dropped.
    pub fn with_auto_commit(mut self, enabled: bool) -> Self {
        self.auto_commit = enabled;
        self
    }

    pub fn with_rolling(mut self, enabled: bool) -> Self {
        self.rolling = enabled;
        self
    }

    pub fn with_renew(mut self, enabled: bool) -> Self {
        self.renew = enabled;
        self
    }

    /// Keep payloads in an external store.
    pub fn with_store(mut self, store: impl SessionStore) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Build the external store per request.
    pub fn with_context_store(mut self, factory: impl ContextStoreFactory) -> Self {
        self.context_store = Some(Arc::new(factory));
        self
    }

    /// Carry the identifier with `external_key` instead of the cookie.
    pub fn with_external_key(mut self, external_key: impl ExternalKey) -> Self {
        self.external_key = Some(Arc::new(external_key));
        self
    }

    pub fn with_genid(mut self, genid: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.genid = Some(Arc::new(genid));
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_codec(mut self, codec: impl Codec) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Reject loaded payloads for which `valid` returns false.
    pub fn with_valid(mut self, valid: impl Fn(&SessionMap) -> bool + Send + Sync + 'static) -> Self {
        self.valid = Some(Arc::new(valid));
        self
    }

    pub fn with_before_save(mut self, hook: impl Fn(&mut Session) + Send + Sync + 'static) -> Self {
        self.before_save = Some(Arc::new(hook));
        self
    }

    pub fn with_event_listener(
        mut self,
        listener: impl Fn(&SessionEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Some(Arc::new(listener));
        self
    }

    /// Whether payloads live in an external store.
    pub fn is_external(&self) -> bool {
        self.store.is_some() || self.context_store.is_some()
    }

    /// Check the options for contradictions.
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(Error::Config("key must not be empty".to_string()));
        }
        if self.max_age == MaxAge::After(Duration::ZERO) {
            return Err(Error::Config(
                "max_age must be greater than zero".to_string(),
            ));
        }
        if self.store.is_some() && self.context_store.is_some() {
            return Err(Error::Config(
                "store and context_store are mutually exclusive".to_string(),
            ));
        }
        if self.external_key.is_some() && !self.is_external() {
            return Err(Error::Config(
                "external_key requires a store or context_store".to_string(),
            ));
        }
        Ok(())
    }

    /// Produce a new session identifier.
    pub fn generate_id(&self) -> String {
        match &self.genid {
            Some(genid) => genid(),
            None => format!(
                "{}{}",
                self.prefix.as_deref().unwrap_or_default(),
                Uuid::new_v4()
            ),
        }
    }

    /// Cookie attributes, without `Max-Age`.
    pub fn cookie_attributes(&self) -> CookieAttributes {
        CookieAttributes {
            path: self.path.clone(),
            domain: self.domain.clone(),
            http_only: self.http_only,
            secure: self.secure,
            same_site: self.same_site,
            signed: self.signed,
            overwrite: self.overwrite,
            max_age: None,
        }
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy {
            rolling: self.rolling,
            renew: self.renew,
        }
    }

    /// Build options from file-provided settings.
    ///
    /// `store = "memory"` creates a private [`MemoryStore`]; use
    /// [`SessionOptions::from_settings_with_store`] to keep a handle to it.
    pub fn from_settings(settings: &SessionSettings) -> Result<Self> {
        match settings.store.as_str() {
            "cookie" => Self::build_from_settings(settings, None),
            "memory" => {
                let store = MemoryStore::new(settings.memory_store_config());
                Self::build_from_settings(settings, Some(Arc::new(store)))
            }
            other => Err(Error::Config(format!(
                "unknown store '{}', expected 'cookie' or 'memory'",
                other
            ))),
        }
    }

    /// Build options from settings with a caller-provided store. The
    /// `store` setting is ignored.
    pub fn from_settings_with_store(
        settings: &SessionSettings,
        store: impl SessionStore,
    ) -> Result<Self> {
        Self::build_from_settings(settings, Some(Arc::new(store)))
    }

    fn build_from_settings(
        settings: &SessionSettings,
        store: Option<Arc<dyn SessionStore>>,
    ) -> Result<Self> {
        let mut options = SessionOptions::new()
            .with_key(&settings.key)
            .with_overwrite(settings.overwrite)
            .with_http_only(settings.http_only)
            .with_signed(settings.signed)
            .with_secure(settings.secure)
            .with_path(&settings.path)
            .with_auto_commit(settings.auto_commit)
            .with_rolling(settings.rolling)
            .with_renew(settings.renew);

        options.max_age = settings.max_age.to_max_age()?;
        options.same_site = settings.same_site;
        options.domain = settings.domain.clone();
        options.prefix = settings.prefix.clone();
        options.store = store;

        if let Some(header) = &settings.external_key_header {
            options = options.with_external_key(HeaderKey::new(header));
        }

        options.validate()?;
        Ok(options)
    }
}

/// Lifetime as written in a settings file: milliseconds or `"session"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxAgeSetting {
    Millis(u64),
    Named(String),
}

impl Default for MaxAgeSetting {
    fn default() -> Self {
        MaxAgeSetting::Millis(DEFAULT_MAX_AGE.as_millis() as u64)
    }
}

impl MaxAgeSetting {
    pub fn to_max_age(&self) -> Result<MaxAge> {
        match self {
            MaxAgeSetting::Millis(ms) => Ok(MaxAge::After(Duration::from_millis(*ms))),
            MaxAgeSetting::Named(name) if name == "session" => Ok(MaxAge::Session),
            MaxAgeSetting::Named(other) => Err(Error::Config(format!(
                "max_age must be milliseconds or \"session\", got \"{}\"",
                other
            ))),
        }
    }
}

/// File-loadable session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub key: String,
    pub max_age: MaxAgeSetting,
    pub overwrite: bool,
    pub http_only: bool,
    pub signed: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
    pub path: String,
    pub domain: Option<String>,
    pub auto_commit: bool,
    pub rolling: bool,
    pub renew: bool,
    /// `"cookie"` for inline sessions, `"memory"` for the in-process store.
    pub store: String,
    pub memory_max_sessions: usize,
    /// Carry the identifier in this header instead of the cookie.
    pub external_key_header: Option<String>,
    pub prefix: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            max_age: MaxAgeSetting::default(),
            overwrite: true,
            http_only: true,
            signed: true,
            secure: false,
            same_site: None,
            path: "/".to_string(),
            domain: None,
            auto_commit: true,
            rolling: false,
            renew: false,
            store: "cookie".to_string(),
            memory_max_sessions: crate::store::DEFAULT_MAX_SESSIONS,
            external_key_header: None,
            prefix: None,
        }
    }
}

impl SessionSettings {
    /// Configuration for a [`MemoryStore`] built from these settings.
    pub fn memory_store_config(&self) -> MemoryStoreConfig {
        MemoryStoreConfig::new().with_max_sessions(self.memory_max_sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SessionOptions::default();
        assert_eq!(options.key, "koa:sess");
        assert_eq!(options.max_age, MaxAge::After(DEFAULT_MAX_AGE));
        assert!(options.overwrite);
        assert!(options.http_only);
        assert!(options.signed);
        assert!(options.auto_commit);
        assert!(!options.is_external());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_default_genid_is_unique_uuid() {
        let options = SessionOptions::new();
        let a = options.generate_id();
        let b = options.generate_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_prefix() {
        let options = SessionOptions::new().with_prefix("sess:");
        let id = options.generate_id();
        assert!(id.starts_with("sess:"));
        assert!(Uuid::parse_str(&id["sess:".len()..]).is_ok());
    }

    #[test]
    fn test_custom_genid_ignores_prefix() {
        let options = SessionOptions::new()
            .with_prefix("sess:")
            .with_genid(|| "fixed".to_string());
        assert_eq!(options.generate_id(), "fixed");
    }

    #[test]
    fn test_validate_empty_key() {
        let options = SessionOptions::new().with_key("  ");
        assert!(matches!(options.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_zero_max_age() {
        let options = SessionOptions::new().with_max_age(Duration::ZERO);
        assert!(matches!(options.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_store_conflict() {
        let options = SessionOptions::new()
            .with_store(MemoryStore::default())
            .with_context_store(|_: &dyn crate::RequestContext| {
                Arc::new(MemoryStore::default()) as Arc<dyn SessionStore>
            });
        assert!(matches!(options.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_external_key_without_store() {
        let options = SessionOptions::new().with_external_key(HeaderKey::new("x-sid"));
        assert!(matches!(options.validate(), Err(Error::Config(_))));

        let options = options.with_store(MemoryStore::default());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_cookie_attributes() {
        let options = SessionOptions::new()
            .with_path("/app")
            .with_domain("example.com")
            .with_secure(true)
            .with_same_site(SameSite::Lax)
            .with_http_only(false);
        let attrs = options.cookie_attributes();
        assert_eq!(attrs.path, "/app");
        assert_eq!(attrs.domain.as_deref(), Some("example.com"));
        assert!(attrs.secure);
        assert!(!attrs.http_only);
        assert_eq!(attrs.same_site, Some(SameSite::Lax));
        assert_eq!(attrs.max_age, None);
    }

    #[test]
    fn test_settings_from_toml() {
        let settings: SessionSettings = toml::from_str(
            r#"
            key = "app.sid"
            max_age = 60000
            store = "memory"
            same_site = "strict"
            rolling = true
            prefix = "s:"
            "#,
        )
        .unwrap();

        let options = SessionOptions::from_settings(&settings).unwrap();
        assert_eq!(options.key, "app.sid");
        assert_eq!(options.max_age, MaxAge::After(Duration::from_secs(60)));
        assert_eq!(options.same_site, Some(SameSite::Strict));
        assert!(options.rolling);
        assert!(options.is_external());
        assert!(options.signed);
        assert!(options.generate_id().starts_with("s:"));
    }

    #[test]
    fn test_settings_with_caller_store() {
        let settings: SessionSettings = toml::from_str(
            r#"
            store = "cookie"
            external_key_header = "x-session-id"
            memory_max_sessions = 5
            "#,
        )
        .unwrap();
        assert_eq!(settings.memory_store_config().max_sessions, 5);

        assert!(SessionOptions::from_settings(&settings).is_err());

        let options =
            SessionOptions::from_settings_with_store(&settings, MemoryStore::default()).unwrap();
        assert!(options.is_external());
        assert!(options.external_key.is_some());
    }

    #[test]
    fn test_settings_session_max_age() {
        let settings: SessionSettings = toml::from_str(r#"max_age = "session""#).unwrap();
        let options = SessionOptions::from_settings(&settings).unwrap();
        assert_eq!(options.max_age, MaxAge::Session);
    }

    #[test]
    fn test_settings_rejects_unknown_values() {
        let settings: SessionSettings = toml::from_str(r#"store = "redis""#).unwrap();
        assert!(matches!(
            SessionOptions::from_settings(&settings),
            Err(Error::Config(_))
        ));

        let settings: SessionSettings = toml::from_str(r#"max_age = "forever""#).unwrap();
        assert!(matches!(
            SessionOptions::from_settings(&settings),
            Err(Error::Config(_))
        ));
    }
}
