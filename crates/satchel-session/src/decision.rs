//! Commit decision: whether a session is written back, and how.

use std::fmt;

use crate::data::MaxAge;
use crate::session::Session;
use crate::snapshot::Snapshot;

/// Why a session is being saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveReason {
    /// [`Session::save`] was called.
    Forced,
    /// A new identifier was requested.
    Regenerated,
    /// The data differs from the snapshot, or the session is new.
    Changed,
    /// The `rolling` option resaves every populated session.
    Rolling,
    /// The `renew` option resaves sessions past half their lifetime.
    Renew,
}

/// Outcome of comparing the live session with its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitDecision {
    /// Leave the store and the cookie alone.
    None,
    /// Write the session back.
    Save(SaveReason),
    /// Delete the stored session and clear the outward identifier.
    Destroy,
}

impl CommitDecision {
    pub fn is_none(&self) -> bool {
        matches!(self, CommitDecision::None)
    }

    pub fn is_save(&self) -> bool {
        matches!(self, CommitDecision::Save(_))
    }
}

impl fmt::Display for CommitDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitDecision::None => write!(f, "none"),
            CommitDecision::Save(reason) => write!(f, "save ({:?})", reason),
            CommitDecision::Destroy => write!(f, "destroy"),
        }
    }
}

/// Refresh behavior for unchanged sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Resave on every request.
    pub rolling: bool,
    /// Resave once less than half the lifetime remains.
    pub renew: bool,
}

/// Decide what to do with a loaded session.
///
/// Rules are applied in order: invalidation wins over everything, an emptied
/// session that existed before is destroyed, an empty new session is left
/// alone, and only then are the save triggers considered.
pub fn decide(
    session: &Session,
    snapshot: &Snapshot,
    policy: RefreshPolicy,
    max_age: MaxAge,
    now_ms: i64,
) -> CommitDecision {
    if session.is_invalidated() {
        return CommitDecision::Destroy;
    }

    let is_new = snapshot.is_absent();
    if session.is_empty() {
        return if is_new {
            CommitDecision::None
        } else {
            CommitDecision::Destroy
        };
    }

    if session.is_save_forced() {
        return CommitDecision::Save(SaveReason::Forced);
    }
    if session.is_regenerate_requested() {
        return CommitDecision::Save(SaveReason::Regenerated);
    }
    if is_new || snapshot.is_changed(session.data()) {
        return CommitDecision::Save(SaveReason::Changed);
    }
    if policy.rolling {
        return CommitDecision::Save(SaveReason::Rolling);
    }
    if policy.renew
        && let (Some(expire), Some(max_age_ms)) = (session.expires_at(), max_age.as_millis())
        && expire.saturating_sub(now_ms) < max_age_ms / 2
    {
        return CommitDecision::Save(SaveReason::Renew);
    }

    CommitDecision::None
}
