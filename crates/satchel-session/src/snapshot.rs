//! Load-time snapshot used for dirty tracking.

use crate::codec::canonical;
use crate::data::SessionMap;

/// Immutable record of the session data as it was loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// No prior session existed, or it could not be decoded.
    Absent,
    /// Canonical encoding of the loaded data.
    Present(String),
}

impl Snapshot {
    /// Capture the given data.
    pub fn of(data: &SessionMap) -> Self {
        Snapshot::Present(canonical(data))
    }

    /// Whether there was no prior session.
    pub fn is_absent(&self) -> bool {
        matches!(self, Snapshot::Absent)
    }

    /// Whether `live` differs from the snapshot.
    ///
    /// Comparison is over canonical encodings, so reordering keys is not a
    /// change. Against an absent snapshot any populated data is a change.
    pub fn is_changed(&self, live: &SessionMap) -> bool {
        match self {
            Snapshot::Absent => !live.is_empty(),
            Snapshot::Present(encoded) => *encoded != canonical(live),
        }
    }
}
