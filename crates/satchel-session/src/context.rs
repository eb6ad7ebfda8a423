//! The request primitives the engine depends on.
//!
//! Cookie parsing, signing and header plumbing belong to the host framework.
//! The engine only needs to read and write named cookies and headers, which
//! is what [`RequestContext`] exposes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// SameSite cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Attributes applied when writing the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttributes {
    pub path: String,
    pub domain: Option<String>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
    /// Sign the cookie so tampering is detected on read.
    pub signed: bool,
    /// Replace a cookie of the same name already written in this response.
    pub overwrite: bool,
    /// `Max-Age`; `None` makes a browser-session cookie.
    pub max_age: Option<Duration>,
}

impl Default for CookieAttributes {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            http_only: true,
            secure: false,
            same_site: None,
            signed: true,
            overwrite: true,
            max_age: None,
        }
    }
}

impl CookieAttributes {
    /// Same attributes with a different `Max-Age`.
    pub fn with_max_age(&self, max_age: Option<Duration>) -> Self {
        Self {
            max_age,
            ..self.clone()
        }
    }
}

/// Access to the current request and its pending response.
pub trait RequestContext: Send + Sync {
    /// Value of a request cookie. With `signed`, a cookie whose signature
    /// does not verify is reported as absent.
    fn cookie(&self, name: &str, signed: bool) -> Option<String>;

    /// Write a cookie to the response.
    fn set_cookie(&mut self, name: &str, value: &str, attrs: &CookieAttributes);

    /// Write a cookie that makes the client drop `name`.
    fn remove_cookie(&mut self, name: &str, attrs: &CookieAttributes);

    /// Value of a request header.
    fn header(&self, name: &str) -> Option<String>;

    /// Write a response header.
    fn set_header(&mut self, name: &str, value: &str);
}
