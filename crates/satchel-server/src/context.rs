//! [`RequestContext`] over HTTP headers and a cookie jar.

use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use cookie::{Cookie, CookieJar, Key};
use satchel_session::{CookieAttributes, RequestContext, SameSite};
use tracing::{trace, warn};

/// Cookie and header access for one request.
///
/// Incoming cookies are parsed once. Writes are collected and turned into
/// `Set-Cookie` headers by [`HttpContext::write_headers`].
pub struct HttpContext {
    jar: CookieJar,
    key: Option<Key>,
    request_headers: HeaderMap,
    response_headers: HeaderMap,
    /// Earlier writes kept when a cookie is written with `overwrite` off.
    retained: Vec<Cookie<'static>>,
}

impl HttpContext {
    /// Parse the request's `Cookie` headers. `key` verifies and signs
    /// signed cookies.
    pub fn new(request_headers: HeaderMap, key: Option<Key>) -> Self {
        let mut jar = CookieJar::new();
        for value in request_headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else {
                trace!("Skipping non-ASCII cookie header");
                continue;
            };
            for cookie in Cookie::split_parse(value).flatten() {
                jar.add_original(cookie.into_owned());
            }
        }

        Self {
            jar,
            key,
            request_headers,
            response_headers: HeaderMap::new(),
            retained: Vec::new(),
        }
    }

    /// Append the collected `Set-Cookie` and response headers.
    pub fn write_headers(&self, headers: &mut HeaderMap) {
        for cookie in self.retained.iter().chain(self.jar.delta()) {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(e) => warn!(cookie = cookie.name(), error = %e, "Dropping unencodable cookie"),
            }
        }
        for (name, value) in &self.response_headers {
            headers.insert(name.clone(), value.clone());
        }
    }

    fn build_cookie(name: &str, value: &str, attrs: &CookieAttributes) -> Cookie<'static> {
        let mut builder = Cookie::build((name.to_string(), value.to_string()))
            .path(attrs.path.clone())
            .http_only(attrs.http_only)
            .secure(attrs.secure);

        if let Some(domain) = &attrs.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(same_site) = attrs.same_site {
            builder = builder.same_site(match same_site {
                SameSite::Strict => cookie::SameSite::Strict,
                SameSite::Lax => cookie::SameSite::Lax,
                SameSite::None => cookie::SameSite::None,
            });
        }
        if let Some(max_age) = attrs.max_age {
            let secs = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
            builder = builder.max_age(cookie::time::Duration::seconds(secs));
        }

        builder.build()
    }

    fn retain_previous(&mut self, name: &str) {
        if let Some(previous) = self.jar.delta().find(|c| c.name() == name) {
            self.retained.push(previous.clone());
        }
    }
}

impl RequestContext for HttpContext {
    fn cookie(&self, name: &str, signed: bool) -> Option<String> {
        if !signed {
            return self.jar.get(name).map(|c| c.value().to_string());
        }
        let Some(key) = &self.key else {
            warn!(cookie = name, "Signed cookie requested without a signing key");
            return None;
        };
        let verified = self.jar.signed(key).get(name);
        if verified.is_none() && self.jar.get(name).is_some() {
            trace!(cookie = name, "Cookie signature did not verify");
        }
        verified.map(|c| c.value().to_string())
    }

    fn set_cookie(&mut self, name: &str, value: &str, attrs: &CookieAttributes) {
        if !attrs.overwrite {
            self.retain_previous(name);
        }
        let cookie = Self::build_cookie(name, value, attrs);
        match (&self.key, attrs.signed) {
            (Some(key), true) => self.jar.signed_mut(key).add(cookie),
            (None, true) => {
                warn!(cookie = name, "Signing requested without a key, writing unsigned");
                self.jar.add(cookie);
            }
            (_, false) => self.jar.add(cookie),
        }
    }

    fn remove_cookie(&mut self, name: &str, attrs: &CookieAttributes) {
        if !attrs.overwrite {
            self.retain_previous(name);
        }
        let mut removal = Cookie::build(name.to_string()).path(attrs.path.clone());
        if let Some(domain) = &attrs.domain {
            removal = removal.domain(domain.clone());
        }
        self.jar.remove(removal.build());
    }

    fn header(&self, name: &str) -> Option<String> {
        self.request_headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn set_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.response_headers.insert(name, value);
            }
            _ => warn!(header = name, "Dropping invalid response header"),
        }
    }
}
