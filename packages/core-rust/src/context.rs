//! The `Context` capability trait and the background root context.
//!
//! A context is a node in a parent chain. Each node can carry a deadline,
//! a done signal that fires on cancellation or expiry, and attached values.
//! Derived contexts observe everything their ancestors carry.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::cancel::CancelState;
use crate::error::ContextError;

/// Shared handle to any context in a chain.
pub type ContextRef = Arc<dyn Context>;

/// A value attached to a context with [`with_value`](crate::with_value).
pub type Value = Arc<dyn Any + Send + Sync>;

/// Type-erasure helper implemented for every sized `Send + Sync + 'static` type.
///
/// Lets a `dyn Context` be inspected for its concrete type through
/// `downcast_ref` and `downcast_arc`.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Cancellation, deadline and value propagation across a call graph.
///
/// Implementations must be cheap to query from many tasks at once. Wrappers
/// that decorate another context forward every method they do not override
/// to the wrapped context.
pub trait Context: AsAny + fmt::Debug {
    /// The instant at which this context expires, if any ancestor set one.
    fn deadline(&self) -> Option<Instant>;

    /// Signal that fires when this context is cancelled or expires.
    fn done(&self) -> Done;

    /// `None` while the context is live, the reason once it is done.
    fn err(&self) -> Option<ContextError>;

    /// Looks up a value attached to this context or any ancestor.
    ///
    /// Keys match when they have the same concrete type and compare equal.
    fn value(&self, key: &dyn Any) -> Option<Value>;
}

impl dyn Context {
    /// Returns `true` if the concrete context type is `T`.
    #[must_use]
    pub fn is<T: Context>(&self) -> bool {
        <dyn Context as AsAny>::as_any(self).is::<T>()
    }

    /// Borrows the context as its concrete type `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: Context>(&self) -> Option<&T> {
        <dyn Context as AsAny>::as_any(self).downcast_ref::<T>()
    }

    /// Converts a shared context handle into a handle of its concrete type.
    ///
    /// The returned `Arc` points at the same allocation.
    #[must_use]
    pub fn downcast_arc<T: Context>(self: Arc<Self>) -> Option<Arc<T>> {
        <dyn Context as AsAny>::into_any(self).downcast::<T>().ok()
    }
}

/// Done signal of a context.
///
/// Cloning yields another observer of the same signal. The signal of a
/// context with no cancellable ancestor never fires.
#[derive(Debug, Clone, Default)]
pub struct Done {
    state: Option<Arc<CancelState>>,
}

impl Done {
    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    pub(crate) fn from_state(state: Arc<CancelState>) -> Self {
        Self { state: Some(state) }
    }

    pub(crate) fn state(&self) -> Option<&Arc<CancelState>> {
        self.state.as_ref()
    }

    /// Returns `true` if the signal can ever fire.
    #[must_use]
    pub fn is_cancellable(&self) -> bool {
        self.state.is_some()
    }

    /// Non-blocking check whether the signal has fired.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.as_ref().is_some_and(|state| state.is_done())
    }

    /// Waits until the signal fires. Never resolves for a non-cancellable context.
    pub async fn wait(&self) {
        match &self.state {
            Some(state) => state.wait().await,
            None => std::future::pending().await,
        }
    }
}

/// Root context: never cancelled, no deadline, no values.
#[derive(Debug, Default, Clone, Copy)]
pub struct Background;

impl Context for Background {
    fn deadline(&self) -> Option<Instant> {
        None
    }

    fn done(&self) -> Done {
        Done::never()
    }

    fn err(&self) -> Option<ContextError> {
        None
    }

    fn value(&self, _key: &dyn Any) -> Option<Value> {
        None
    }
}

/// Returns a fresh root context.
#[must_use]
pub fn background() -> ContextRef {
    Arc::new(Background)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn background_is_inert() {
        let ctx = background();
        assert!(ctx.deadline().is_none());
        assert!(ctx.err().is_none());
        assert!(!ctx.done().is_done());
        assert!(!ctx.done().is_cancellable());
        assert!(ctx.value(&"anything").is_none());
    }

    #[test]
    fn downcast_to_concrete_type() {
        let ctx = background();
        assert!(ctx.is::<Background>());
        assert!(ctx.downcast_ref::<Background>().is_some());

        let concrete = Arc::clone(&ctx).downcast_arc::<Background>();
        let concrete = concrete.expect("background downcasts to itself");
        assert!(std::ptr::addr_eq(Arc::as_ptr(&concrete), Arc::as_ptr(&ctx)));
    }

    #[tokio::test]
    async fn never_signal_does_not_fire() {
        let done = background().done();
        let waited = tokio::time::timeout(Duration::from_millis(20), done.wait()).await;
        assert!(waited.is_err());
    }
}
