//! Persistence backends: inline cookie or external store.
//!
//! The backend is chosen once when the engine is built. Each request gets a
//! [`RequestBackend`] with its store resolved, and the engine talks to it
//! only through `load`, `save` and `destroy`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{trace, warn};

use crate::config::SessionOptions;
use crate::context::RequestContext;
use crate::data::{MaxAge, SessionMap};
use crate::error::Result;
use crate::external_key::ExternalKey;
use crate::store::{SessionStore, StoreSource};

/// Extra time the store keeps a record beyond the cookie's lifetime.
pub const STORE_TTL_MARGIN: Duration = Duration::from_secs(10);

/// Largest cookie browsers reliably accept, name and attributes excluded.
pub const MAX_COOKIE_BYTES: usize = 4093;

/// Backend selected at engine construction.
#[derive(Clone)]
pub(crate) enum Backend {
    Inline,
    External {
        store: StoreSource,
        external_key: Option<Arc<dyn ExternalKey>>,
    },
}

impl Backend {
    pub(crate) fn from_options(options: &SessionOptions) -> Self {
        let store = match (&options.store, &options.context_store) {
            (Some(store), _) => Some(StoreSource::Shared(Arc::clone(store))),
            (None, Some(factory)) => Some(StoreSource::PerRequest(Arc::clone(factory))),
            (None, None) => None,
        };
        match store {
            Some(store) => Backend::External {
                store,
                external_key: options.external_key.clone(),
            },
            None => Backend::Inline,
        }
    }

    pub(crate) fn for_request(&self, ctx: &dyn RequestContext) -> RequestBackend {
        match self {
            Backend::Inline => RequestBackend::Inline,
            Backend::External {
                store,
                external_key,
            } => RequestBackend::External {
                store: store.resolve(ctx),
                external_key: external_key.clone(),
            },
        }
    }
}

/// What a load found.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LoadOutcome {
    /// A payload, with its identifier in external mode.
    Found {
        payload: SessionMap,
        id: Option<String>,
    },
    /// The request carried no session.
    Missing,
    /// The request carried an identifier the store does not know.
    Missed { id: String },
    /// The cookie did not decode.
    Undecodable,
    /// The store failed; the session is treated as absent.
    Unavailable,
}

/// Backend for one request.
pub(crate) enum RequestBackend {
    Inline,
    External {
        store: Arc<dyn SessionStore>,
        external_key: Option<Arc<dyn ExternalKey>>,
    },
}

impl RequestBackend {
    pub(crate) async fn load(
        &self,
        ctx: &dyn RequestContext,
        options: &SessionOptions,
    ) -> LoadOutcome {
        match self {
            RequestBackend::Inline => {
                let Some(raw) = ctx.cookie(&options.key, options.signed) else {
                    return LoadOutcome::Missing;
                };
                match options.codec.decode(&raw) {
                    Some(payload) => LoadOutcome::Found { payload, id: None },
                    None => LoadOutcome::Undecodable,
                }
            }
            RequestBackend::External {
                store,
                external_key,
            } => {
                let id = match external_key {
                    Some(external_key) => external_key.get(ctx),
                    None => ctx.cookie(&options.key, options.signed),
                };
                let Some(id) = id else {
                    return LoadOutcome::Missing;
                };

                match store.get(&id).await {
                    Ok(Some(payload)) => LoadOutcome::Found {
                        payload,
                        id: Some(id),
                    },
                    Ok(None) => LoadOutcome::Missed { id },
                    Err(e) => {
                        warn!(session_id = %id, error = %e, "Session store unavailable, starting a fresh session");
                        LoadOutcome::Unavailable
                    }
                }
            }
        }
    }

    /// Persist a payload and publish its identifier.
    ///
    /// Returns the identifier the session is now stored under (external
    /// mode only).
    pub(crate) async fn save(
        &self,
        ctx: &mut dyn RequestContext,
        options: &SessionOptions,
        current_id: Option<&str>,
        payload: &SessionMap,
        max_age: MaxAge,
        regenerate: bool,
    ) -> Result<Option<String>> {
        let attrs = options.cookie_attributes().with_max_age(max_age.duration());

        match self {
            RequestBackend::Inline => {
                let encoded = options.codec.encode(payload)?;
                if encoded.len() > MAX_COOKIE_BYTES {
                    warn!(
                        key = %options.key,
                        bytes = encoded.len(),
                        "Session cookie exceeds browser size limit and may be dropped"
                    );
                }
                ctx.set_cookie(&options.key, &encoded, &attrs);
                trace!(key = %options.key, bytes = encoded.len(), "Session cookie written");
                Ok(None)
            }
            RequestBackend::External {
                store,
                external_key,
            } => {
                let id = match current_id {
                    Some(old) if regenerate => {
                        store.destroy(old).await?;
                        trace!(session_id = %old, "Old session destroyed for regeneration");
                        options.generate_id()
                    }
                    Some(id) => id.to_string(),
                    None => options.generate_id(),
                };

                let ttl = max_age.duration().map(|d| d.saturating_add(STORE_TTL_MARGIN));
                store.set(&id, payload, ttl).await?;

                match external_key {
                    Some(external_key) => external_key.set(ctx, &id),
                    None => ctx.set_cookie(&options.key, &id, &attrs),
                }
                trace!(session_id = %id, "Session stored");
                Ok(Some(id))
            }
        }
    }

    /// Delete the session and clear the outward state. Idempotent.
    pub(crate) async fn destroy(
        &self,
        ctx: &mut dyn RequestContext,
        options: &SessionOptions,
        id: Option<&str>,
    ) -> Result<()> {
        let attrs = options.cookie_attributes();

        match self {
            RequestBackend::Inline => {
                ctx.remove_cookie(&options.key, &attrs);
            }
            RequestBackend::External {
                store,
                external_key,
            } => {
                if let Some(id) = id {
                    store.destroy(id).await?;
                    trace!(session_id = %id, "Session destroyed");
                }
                match external_key {
                    Some(external_key) => external_key.clear(ctx),
                    None => ctx.remove_cookie(&options.key, &attrs),
                }
            }
        }
        Ok(())
    }
}
