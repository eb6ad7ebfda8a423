//! Error types for session operations.

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Options are inconsistent; raised before any request is served.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the external session store.
    #[error("Store error: {0}")]
    Store(String),

    /// The codec could not encode the session payload.
    #[error("Encode error: {0}")]
    Encode(String),

    /// A value could not be converted to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The key is reserved for session metadata.
    #[error("Reserved session key: {0}")]
    ReservedKey(String),
}

impl Error {
    /// Build a store error from any displayable backend error.
    pub fn store(err: impl std::fmt::Display) -> Self {
        Error::Store(err.to_string())
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
