//! Wrapper-aware derivations.
//!
//! Each function checks whether its input is a [`RequestContext`]. If it is,
//! the new context is derived from the wrapper's base and the wrapper is
//! returned, so request id, through params and logger stay attached. Any
//! other context is derived with the plain `reqctx_core` function.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqctx_core::{cancel, value, CancelFunc, ContextKey, ContextRef};
use tracing::trace;

use crate::context::RequestContext;

/// Bounds `ctx` by `timeout`.
///
/// A request context gets the bounded base in place and is returned as the
/// same instance.
pub fn with_timeout(ctx: &ContextRef, timeout: Duration) -> (ContextRef, CancelFunc) {
    match ctx.downcast_ref::<RequestContext>() {
        Some(request) => {
            let cancel = request.derive_in_place(|base| cancel::with_timeout(base, timeout));
            trace!(
                request_id = request.request_id(),
                ?timeout,
                "request context bounded by timeout"
            );
            (Arc::clone(ctx), cancel)
        }
        None => cancel::with_timeout(ctx, timeout),
    }
}

/// Bounds `ctx` by `deadline`, in place for a request context.
pub fn with_deadline(ctx: &ContextRef, deadline: Instant) -> (ContextRef, CancelFunc) {
    match ctx.downcast_ref::<RequestContext>() {
        Some(request) => {
            let cancel = request.derive_in_place(|base| cancel::with_deadline(base, deadline));
            trace!(request_id = request.request_id(), "request context bounded by deadline");
            (Arc::clone(ctx), cancel)
        }
        None => cancel::with_deadline(ctx, deadline),
    }
}

/// Makes `ctx` cancellable.
///
/// A request context gets the cancellable base in place and is returned as
/// the same instance. Every holder of the wrapper observes the cancel.
pub fn with_cancel(ctx: &ContextRef) -> (ContextRef, CancelFunc) {
    match ctx.downcast_ref::<RequestContext>() {
        Some(request) => {
            let cancel = request.derive_in_place(cancel::with_cancel);
            trace!(request_id = request.request_id(), "request context made cancellable");
            (Arc::clone(ctx), cancel)
        }
        None => cancel::with_cancel(ctx),
    }
}

/// Makes a cancellable copy of `ctx`, leaving `ctx` untouched.
///
/// For a request context the result is a new wrapper over a cancellable
/// child of the original base. It shares the request id, the through-params
/// map and the logger with the original. Cancelling it does not end the
/// original. Use this when fanning out from one request context to
/// concurrent tasks.
pub fn with_cancel_without_overriding(ctx: &ContextRef) -> (ContextRef, CancelFunc) {
    match ctx.downcast_ref::<RequestContext>() {
        Some(request) => {
            let (base, cancel) = cancel::with_cancel(&request.base());
            trace!(request_id = request.request_id(), "request context copied with cancel");
            let copy: ContextRef = Arc::new(request.shallow_copy(base));
            (copy, cancel)
        }
        None => cancel::with_cancel(ctx),
    }
}

/// Attaches `key: value` to `ctx`, in place for a request context.
///
/// Use a dedicated key type per use so that keys of unrelated components
/// cannot collide.
pub fn with_value<K, V>(ctx: &ContextRef, key: K, value: V) -> ContextRef
where
    K: ContextKey,
    V: Any + Send + Sync,
{
    match ctx.downcast_ref::<RequestContext>() {
        Some(request) => {
            request.derive_in_place(|base| (value::with_value(base, key, value), ()));
            Arc::clone(ctx)
        }
        None => value::with_value(ctx, key, value),
    }
}
