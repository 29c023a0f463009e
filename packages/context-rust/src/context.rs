//! The request context wrapper.
//!
//! A [`RequestContext`] wraps a base context and adds the request id, the
//! through params mirrored into outgoing metadata, and a logger span bound
//! to the request id.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqctx_core::{
    cancel, outgoing_metadata, with_outgoing_metadata, CancelFunc, Context, ContextError,
    ContextRef, Done, Value,
};
use tracing::{info_span, warn, Span};

use crate::options::{ContextOption, ContextOptions};
use crate::params::ThroughParams;

/// Metadata key carrying the request id. Always present in through params.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request-scoped context: a wrapped base context plus the request id,
/// through params, and a logger bound to the request id.
///
/// Implements [`Context`] by forwarding to the current base, so it can be
/// passed anywhere a plain context is expected. The base is replaced in
/// place by the derivation functions of this crate.
#[derive(Debug)]
pub struct RequestContext {
    base: RwLock<ContextRef>,
    request_id: String,
    through_params: ThroughParams,
    logger: Option<Span>,
}

impl RequestContext {
    /// Builds a request context from `options`, applied in order.
    ///
    /// After the options apply, the request id is written to the through
    /// params under [`REQUEST_ID_HEADER`], the logger (if any) is replaced
    /// by a child span carrying `request_id`, and every through param is
    /// appended to the base's outgoing metadata. Never fails: a pair that
    /// cannot travel as metadata is logged and left out of the metadata.
    #[must_use]
    pub fn new<I>(options: I) -> Arc<Self>
    where
        I: IntoIterator<Item = ContextOption>,
    {
        Self::from_options(options.into_iter().collect())
    }

    /// Builds a request context from already-collected settings.
    #[must_use]
    pub fn from_options(options: ContextOptions) -> Arc<Self> {
        let ContextOptions {
            base,
            request_id,
            through_params,
            logger,
        } = options;

        let through_params = through_params.unwrap_or_default();
        through_params.insert(REQUEST_ID_HEADER, request_id.as_str());

        let logger = logger
            .map(|parent| info_span!(parent: &parent, "request", request_id = %request_id));

        let base = attach_through_params(&base, &through_params, &request_id);

        Arc::new(Self {
            base: RwLock::new(base),
            request_id,
            through_params,
            logger,
        })
    }

    /// Builds a request context whose base expires after `timeout`.
    ///
    /// Same as [`RequestContext::new`] followed by
    /// [`with_timeout`](crate::with_timeout) on the result.
    pub fn new_with_timeout<I>(timeout: Duration, options: I) -> (Arc<Self>, CancelFunc)
    where
        I: IntoIterator<Item = ContextOption>,
    {
        let ctx = Self::new(options);
        let cancel = ctx.derive_in_place(|base| cancel::with_timeout(base, timeout));
        (ctx, cancel)
    }

    /// Returns the request context behind `ctx`, if it is one.
    #[must_use]
    pub fn from_context(ctx: &ContextRef) -> Option<Arc<Self>> {
        Arc::clone(ctx).downcast_arc::<Self>()
    }

    /// The request id. Empty if none was set.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The live through-params map, shared with every shallow copy.
    #[must_use]
    pub fn through_params(&self) -> &ThroughParams {
        &self.through_params
    }

    /// The request logger, if a logger was supplied at construction.
    #[must_use]
    pub fn logger(&self) -> Option<&Span> {
        self.logger.as_ref()
    }

    /// The currently wrapped base context.
    #[must_use]
    pub fn base(&self) -> ContextRef {
        Arc::clone(&*self.base.read())
    }

    /// Replaces the base with the context produced by `derive` from the current base.
    pub(crate) fn derive_in_place<R>(
        &self,
        derive: impl FnOnce(&ContextRef) -> (ContextRef, R),
    ) -> R {
        let mut base = self.base.write();
        let (derived, out) = derive(&base);
        *base = derived;
        out
    }

    /// Copy of this context over `base`. Shares the through-params map and logger.
    pub(crate) fn shallow_copy(&self, base: ContextRef) -> Self {
        Self {
            base: RwLock::new(base),
            request_id: self.request_id.clone(),
            through_params: self.through_params.clone(),
            logger: self.logger.clone(),
        }
    }
}

fn attach_through_params(
    base: &ContextRef,
    params: &ThroughParams,
    request_id: &str,
) -> ContextRef {
    let mut md = outgoing_metadata(&**base);
    for (key, value) in params.snapshot() {
        if let Err(err) = md.append(&key, &value) {
            warn!(request_id, error = %err, "through param left out of outgoing metadata");
        }
    }
    with_outgoing_metadata(base, md)
}

impl Context for RequestContext {
    fn deadline(&self) -> Option<Instant> {
        self.base.read().deadline()
    }

    fn done(&self) -> Done {
        self.base.read().done()
    }

    fn err(&self) -> Option<ContextError> {
        self.base.read().err()
    }

    fn value(&self, key: &dyn Any) -> Option<Value> {
        self.base.read().value(key)
    }
}
