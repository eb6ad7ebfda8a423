//! Identifier transport outside the session cookie.

use crate::context::RequestContext;

/// Reads and writes the session identifier for external-store mode.
///
/// When configured, it replaces the cookie as the carrier of the identifier.
pub trait ExternalKey: Send + Sync + 'static {
    /// Identifier presented by the request, if any.
    fn get(&self, ctx: &dyn RequestContext) -> Option<String>;

    /// Hand a (possibly new) identifier back to the client.
    fn set(&self, ctx: &mut dyn RequestContext, id: &str);

    /// Tell the client its identifier is no longer valid.
    fn clear(&self, _ctx: &mut dyn RequestContext) {}
}

/// Carries the identifier in a request header and echoes it in a response
/// header of the same name.
#[derive(Debug, Clone)]
pub struct HeaderKey {
    name: String,
}

impl HeaderKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ExternalKey for HeaderKey {
    fn get(&self, ctx: &dyn RequestContext) -> Option<String> {
        ctx.header(&self.name).filter(|v| !v.is_empty())
    }

    fn set(&self, ctx: &mut dyn RequestContext, id: &str) {
        ctx.set_header(&self.name, id);
    }

    fn clear(&self, ctx: &mut dyn RequestContext) {
        ctx.set_header(&self.name, "");
    }
}
