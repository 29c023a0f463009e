//! Construction options for [`RequestContext`](crate::RequestContext).

use reqctx_core::{background, ContextRef, Metadata};
use tracing::Span;

use crate::context::REQUEST_ID_HEADER;
use crate::params::ThroughParams;

/// A single construction option, applied in the order given to
/// [`RequestContext::new`](crate::RequestContext::new).
#[derive(Debug, Clone)]
pub enum ContextOption {
    /// Use this context as the wrapped base.
    Base(ContextRef),
    /// Set the request id. An empty id leaves the current one in place.
    RequestId(String),
    /// Set a fresh UUID v4 request id unless one is already set.
    GeneratedRequestId,
    /// Replace the through-params map reference.
    ThroughParams(ThroughParams),
    /// Attach a logger span.
    Logger(Span),
}

/// Wraps `ctx` instead of a fresh background context.
#[must_use]
pub fn with_base(ctx: ContextRef) -> ContextOption {
    ContextOption::Base(ctx)
}

/// Sets the request id. Ignored if `request_id` is empty.
#[must_use]
pub fn with_request_id(request_id: impl Into<String>) -> ContextOption {
    ContextOption::RequestId(request_id.into())
}

/// Generates a UUID v4 request id if no earlier option set one.
#[must_use]
pub fn with_generated_request_id() -> ContextOption {
    ContextOption::GeneratedRequestId
}

/// Uses `params` as the through-params map. The context keeps this exact
/// handle, so later inserts through `params` are visible from the context.
#[must_use]
pub fn with_through_params(params: ThroughParams) -> ContextOption {
    ContextOption::ThroughParams(params)
}

/// Attaches a logger. The context stores a child span carrying `request_id`.
#[must_use]
pub fn with_logger(logger: Span) -> ContextOption {
    ContextOption::Logger(logger)
}

/// Takes the request id of an incoming call from its `x-request-id` metadata.
/// Behaves like [`with_request_id`]: a missing or empty header changes nothing.
#[must_use]
pub fn with_incoming(md: &Metadata) -> ContextOption {
    ContextOption::RequestId(md.get(REQUEST_ID_HEADER).unwrap_or_default().to_string())
}

/// Settings a request context is built from.
///
/// `Default` is the starting point before any option applies: a fresh
/// background base, an empty request id, no through params, no logger.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Context to wrap.
    pub base: ContextRef,
    /// Request id. Empty means unset.
    pub request_id: String,
    /// Through params. `None` means a new empty map is allocated.
    pub through_params: Option<ThroughParams>,
    /// Logger to derive the request logger from.
    pub logger: Option<Span>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            base: background(),
            request_id: String::new(),
            through_params: None,
            logger: None,
        }
    }
}

impl ContextOptions {
    /// Applies one option on top of the current settings.
    pub fn apply(&mut self, option: ContextOption) {
        match option {
            ContextOption::Base(ctx) => self.base = ctx,
            ContextOption::RequestId(request_id) => {
                if !request_id.is_empty() {
                    self.request_id = request_id;
                }
            }
            ContextOption::GeneratedRequestId => {
                if self.request_id.is_empty() {
                    self.request_id = new_request_id();
                }
            }
            ContextOption::ThroughParams(params) => self.through_params = Some(params),
            ContextOption::Logger(logger) => self.logger = Some(logger),
        }
    }
}

impl FromIterator<ContextOption> for ContextOptions {
    fn from_iter<I: IntoIterator<Item = ContextOption>>(iter: I) -> Self {
        let mut options = Self::default();
        for option in iter {
            options.apply(option);
        }
        options
    }
}

/// A fresh random request id (UUID v4, hyphenated).
#[must_use]
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
