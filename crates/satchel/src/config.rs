//! Demo server configuration file.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:3000"
//!
//! [session]
//! key = "satchel.sid"
//! max_age = 3600000
//! store = "memory"
//! ```

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context as _, Result};
use satchel_session::SessionSettings;
use serde::{Deserialize, Serialize};

/// Default bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub session: SessionSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .with_context(|| format!("invalid bind address '{}'", self.server.bind))
    }
}
