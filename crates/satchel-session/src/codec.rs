//! Payload codecs.
//!
//! A codec turns a session payload into a string that can travel in a cookie
//! and back. Decoding foreign or tampered input yields `None`; it is never an
//! error the request has to handle.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use tracing::trace;

use crate::data::SessionMap;
use crate::error::{Error, Result};

/// Encodes and decodes session payloads.
pub trait Codec: Send + Sync + 'static {
    /// Encode a payload into a transportable string.
    fn encode(&self, payload: &SessionMap) -> Result<String>;

    /// Decode a string produced by [`Codec::encode`].
    ///
    /// Returns `None` for anything that is not a valid encoded payload.
    fn decode(&self, raw: &str) -> Option<SessionMap>;
}

/// JSON serialized, then base64 encoded with the standard alphabet.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, payload: &SessionMap) -> Result<String> {
        let json = serde_json::to_vec(payload).map_err(|e| Error::Encode(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    fn decode(&self, raw: &str) -> Option<SessionMap> {
        let bytes = match STANDARD.decode(raw.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                trace!(error = %e, "Payload is not base64");
                return None;
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => {
                trace!("Payload is not a JSON object");
                None
            }
            Err(e) => {
                trace!(error = %e, "Payload is not valid JSON");
                None
            }
        }
    }
}

/// Canonical form used for dirty comparison.
///
/// `serde_json::Map` is ordered by key, so two maps holding the same entries
/// always produce the same string regardless of insertion order.
pub fn canonical(data: &SessionMap) -> String {
    serde_json::to_string(data).unwrap_or_default()
}
