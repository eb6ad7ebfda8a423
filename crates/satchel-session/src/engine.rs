//! Session lifecycle engine.
//!
//! A [`SessionEngine`] is built once from validated options. Every request
//! gets its own [`RequestSession`], which:
//!
//! 1. loads lazily on first access (cookie decode or store lookup),
//! 2. hands out the mutable [`Session`] to handlers,
//! 3. compares it with the load-time snapshot on commit and executes the
//!    resulting [`CommitDecision`] exactly once.
//!
//! Sessions are not locked across requests. Two requests committing the
//! same identifier race and the store keeps whichever write lands last.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, trace};

use crate::backend::{Backend, LoadOutcome, RequestBackend};
use crate::config::SessionOptions;
use crate::context::RequestContext;
use crate::data::{MaxAge, SessionMap, join_payload, split_payload};
use crate::decision::{CommitDecision, decide};
use crate::error::Result;
use crate::session::Session;
use crate::snapshot::Snapshot;

/// Something noteworthy that happened while loading a session.
///
/// `key` is the session identifier in external mode and the cookie name in
/// inline mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The store had no record for the presented identifier.
    Missed { key: String },
    /// The stored session was past its expiry.
    Expired { key: String },
    /// The payload did not decode or was rejected by the `valid` hook.
    Invalid { key: String },
}

struct EngineInner {
    options: Arc<SessionOptions>,
    backend: Backend,
}

/// Shared entry point, cheap to clone.
#[derive(Clone)]
pub struct SessionEngine {
    inner: Arc<EngineInner>,
}

impl SessionEngine {
    /// Validate the options and select the backend.
    pub fn new(options: SessionOptions) -> Result<Self> {
        options.validate()?;
        let backend = Backend::from_options(&options);
        debug!(
            key = %options.key,
            external = options.is_external(),
            auto_commit = options.auto_commit,
            "Session engine configured"
        );
        Ok(Self {
            inner: Arc::new(EngineInner {
                options: Arc::new(options),
                backend,
            }),
        })
    }

    pub fn options(&self) -> &Arc<SessionOptions> {
        &self.inner.options
    }

    /// Create the session slot for one request. Nothing is loaded yet.
    pub fn begin(&self, ctx: &dyn RequestContext) -> RequestSession {
        RequestSession {
            options: Arc::clone(&self.inner.options),
            backend: self.inner.backend.for_request(ctx),
            loaded: None,
            committed: false,
        }
    }
}

struct LoadedSession {
    session: Session,
    snapshot: Snapshot,
    id: Option<String>,
}

/// The session slot of a single request.
pub struct RequestSession {
    options: Arc<SessionOptions>,
    backend: RequestBackend,
    loaded: Option<LoadedSession>,
    committed: bool,
}

impl RequestSession {
    pub fn options(&self) -> &Arc<SessionOptions> {
        &self.options
    }

    /// Load the session if needed and return it.
    pub async fn load(&mut self, ctx: &dyn RequestContext) -> &mut Session {
        if self.loaded.is_none() {
            let loaded = self.load_from_backend(ctx).await;
            self.loaded = Some(loaded);
        }
        &mut self.loaded.get_or_insert_with(Self::fresh).session
    }

    /// The session, if it has been loaded.
    pub fn session(&self) -> Option<&Session> {
        self.loaded.as_ref().map(|l| &l.session)
    }

    /// The session, mutably, if it has been loaded.
    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.loaded.as_mut().map(|l| &mut l.session)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Identifier of the stored session (external mode only).
    pub fn id(&self) -> Option<&str> {
        self.loaded.as_ref().and_then(|l| l.id.as_deref())
    }

    /// Whether the data differs from what was loaded.
    pub fn is_changed(&self) -> bool {
        self.loaded
            .as_ref()
            .is_some_and(|l| l.snapshot.is_changed(l.session.data()))
    }

    /// The decision a commit would execute right now.
    pub fn decision(&self) -> CommitDecision {
        match &self.loaded {
            Some(loaded) if !self.committed => {
                let now = Utc::now().timestamp_millis();
                decide(
                    &loaded.session,
                    &loaded.snapshot,
                    self.options.refresh_policy(),
                    self.effective_max_age(&loaded.session),
                    now,
                )
            }
            _ => CommitDecision::None,
        }
    }

    /// Replace the session data wholesale; `None` empties it.
    pub async fn replace(
        &mut self,
        ctx: &dyn RequestContext,
        data: Option<SessionMap>,
    ) {
        self.load(ctx).await.replace(data);
    }

    /// Execute the commit decision.
    ///
    /// Runs at most once successfully; later calls return
    /// [`CommitDecision::None`]. A failed commit can be retried.
    pub async fn commit(&mut self, ctx: &mut dyn RequestContext) -> Result<CommitDecision> {
        if self.committed {
            trace!(key = %self.options.key, "Session already committed");
            return Ok(CommitDecision::None);
        }

        let decision = self.decision();
        let Self {
            ref options,
            ref backend,
            ref mut loaded,
            ref mut committed,
        } = *self;

        let Some(loaded) = loaded.as_mut() else {
            trace!(key = %options.key, "Session never accessed, nothing to commit");
            *committed = true;
            return Ok(CommitDecision::None);
        };

        debug!(
            key = %options.key,
            session_id = ?loaded.id,
            decision = %decision,
            "Committing session"
        );

        match decision {
            CommitDecision::None => {}
            CommitDecision::Destroy => {
                backend
                    .destroy(ctx, options, loaded.id.as_deref())
                    .await?;
                loaded.id = None;
            }
            CommitDecision::Save(_) => {
                if let Some(before_save) = &options.before_save {
                    before_save(&mut loaded.session);
                }
                let max_age = loaded.session.max_age().unwrap_or(options.max_age);
                let now = Utc::now().timestamp_millis();
                let payload = join_payload(loaded.session.data(), max_age, now);
                let regenerate = loaded.session.is_regenerate_requested();

                let id = backend
                    .save(
                        ctx,
                        options,
                        loaded.id.as_deref(),
                        &payload,
                        max_age,
                        regenerate,
                    )
                    .await?;
                loaded.id = id;
                loaded.snapshot = Snapshot::of(loaded.session.data());
            }
        }

        loaded.session.clear_flags();
        *committed = true;
        Ok(decision)
    }

    fn effective_max_age(&self, session: &Session) -> MaxAge {
        session.max_age().unwrap_or(self.options.max_age)
    }

    async fn load_from_backend(&self, ctx: &dyn RequestContext) -> LoadedSession {
        let outcome = self.backend.load(ctx, &self.options).await;
        let cookie_key = || self.options.key.clone();

        let (payload, id) = match outcome {
            LoadOutcome::Found { payload, id } => (payload, id),
            LoadOutcome::Missing => {
                trace!(key = %self.options.key, "No session presented");
                return Self::fresh();
            }
            LoadOutcome::Missed { id } => {
                self.emit(SessionEvent::Missed { key: id });
                return Self::fresh();
            }
            LoadOutcome::Undecodable => {
                self.emit(SessionEvent::Invalid { key: cookie_key() });
                return Self::fresh();
            }
            LoadOutcome::Unavailable => return Self::fresh(),
        };

        let event_key = id.clone().unwrap_or_else(cookie_key);
        let Some((data, metadata)) = split_payload(payload) else {
            self.emit(SessionEvent::Invalid { key: event_key });
            return Self::fresh();
        };

        if metadata.is_expired(Utc::now().timestamp_millis()) {
            self.emit(SessionEvent::Expired { key: event_key });
            return Self::fresh();
        }
        if let Some(valid) = &self.options.valid
            && !valid(&data)
        {
            self.emit(SessionEvent::Invalid { key: event_key });
            return Self::fresh();
        }

        debug!(key = %self.options.key, session_id = ?id, keys = data.len(), "Session loaded");
        LoadedSession {
            snapshot: Snapshot::of(&data),
            session: Session::restore(data, metadata),
            id,
        }
    }

    fn fresh() -> LoadedSession {
        LoadedSession {
            session: Session::new(),
            snapshot: Snapshot::Absent,
            id: None,
        }
    }

    fn emit(&self, event: SessionEvent) {
        debug!(event = ?event, "Session discarded at load");
        if let Some(listener) = &self.options.on_event {
            listener(&event);
        }
    }
}
