//! Cancellable and deadline-bound contexts.
//!
//! Every cancellable context owns a `CancelState`: a [`CancellationToken`]
//! derived with `child_token()` from the nearest cancellable ancestor, the
//! recorded error, and the effective deadline. Cancelling a token cancels
//! every token derived from it, so the signal reaches all descendants.
//!
//! Deadlines are enforced lazily. A state whose deadline has passed cancels
//! itself with [`ContextError::DeadlineExceeded`] the next time anyone asks
//! for its error or waits on it, so deriving a context never spawns a timer
//! task and needs no runtime.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::context::{Context, ContextRef, Done, Value};
use crate::error::ContextError;

// ---------------------------------------------------------------------------
// CancelState
// ---------------------------------------------------------------------------

/// Shared cancellation state of one cancellable context.
#[derive(Debug)]
pub(crate) struct CancelState {
    token: CancellationToken,
    reason: Mutex<Option<ContextError>>,
    /// Effective deadline: the earlier of the own and the inherited one.
    deadline: Option<Instant>,
    parent: Option<Arc<CancelState>>,
}

impl CancelState {
    fn root(deadline: Option<Instant>) -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Mutex::new(None),
            deadline,
            parent: None,
        }
    }

    fn child_of(parent: Arc<CancelState>, deadline: Option<Instant>) -> Self {
        Self {
            token: parent.token.child_token(),
            reason: Mutex::new(None),
            deadline,
            parent: Some(parent),
        }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub(crate) fn err(&self) -> Option<ContextError> {
        if let Some(reason) = *self.reason.lock() {
            return Some(reason);
        }
        if self.deadline_passed() || self.token.is_cancelled() {
            // The reason passed here is overridden by the deadline or the ancestor's.
            self.cancel(ContextError::Canceled);
            return *self.reason.lock();
        }
        None
    }

    pub(crate) fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Records `reason` and cancels the token, which cancels every descendant.
    ///
    /// The first reason wins. An elapsed deadline takes precedence over an
    /// explicit cancel, matching what a timer would have reported first.
    /// A token already cancelled from above keeps the ancestor's reason.
    pub(crate) fn cancel(&self, reason: ContextError) {
        let reason = if self.deadline_passed() {
            ContextError::DeadlineExceeded
        } else if self.token.is_cancelled() {
            self.inherited_reason()
        } else {
            reason
        };

        {
            let mut slot = self.reason.lock();
            if slot.is_some() {
                return;
            }
            *slot = Some(reason);
        }
        trace!(?reason, "context cancelled");
        self.token.cancel();
    }

    /// Reason recorded by the nearest ancestor that has one.
    fn inherited_reason(&self) -> ContextError {
        let mut ancestor = self.parent.as_deref();
        while let Some(state) = ancestor {
            if let Some(reason) = *state.reason.lock() {
                return reason;
            }
            ancestor = state.parent.as_deref();
        }
        ContextError::Canceled
    }

    pub(crate) async fn wait(&self) {
        if self.is_done() {
            return;
        }

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => {}
                    () = tokio::time::sleep_until(deadline.into()) => {
                        self.cancel(ContextError::DeadlineExceeded);
                    }
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

// ---------------------------------------------------------------------------
// CancelContext
// ---------------------------------------------------------------------------

/// Context derived with [`with_cancel`], [`with_deadline`] or [`with_timeout`].
#[derive(Debug)]
pub struct CancelContext {
    parent: ContextRef,
    state: Arc<CancelState>,
}

impl CancelContext {
    /// The context this one was derived from.
    #[must_use]
    pub fn parent(&self) -> &ContextRef {
        &self.parent
    }
}

impl Context for CancelContext {
    fn deadline(&self) -> Option<Instant> {
        self.state.deadline
    }

    fn done(&self) -> Done {
        Done::from_state(Arc::clone(&self.state))
    }

    fn err(&self) -> Option<ContextError> {
        self.state.err()
    }

    fn value(&self, key: &dyn Any) -> Option<Value> {
        self.parent.value(key)
    }
}

// ---------------------------------------------------------------------------
// CancelFunc
// ---------------------------------------------------------------------------

/// Handle that cancels a derived context.
///
/// Dropping the handle does not cancel. Callers invoke [`CancelFunc::cancel`]
/// on every exit path once the derived context is no longer needed.
#[derive(Debug, Clone)]
#[must_use = "a derived context stays linked to its parent until cancelled"]
pub struct CancelFunc {
    state: Arc<CancelState>,
}

impl CancelFunc {
    /// Cancels the derived context and its descendants with
    /// [`ContextError::Canceled`].
    ///
    /// Idempotent. Has no effect on the parent.
    pub fn cancel(&self) {
        self.state.cancel(ContextError::Canceled);
    }
}

// ---------------------------------------------------------------------------
// Derivations
// ---------------------------------------------------------------------------

fn derive(parent: &ContextRef, deadline: Option<Instant>) -> (ContextRef, CancelFunc) {
    let state = match parent.done().state() {
        Some(parent_state) => CancelState::child_of(Arc::clone(parent_state), deadline),
        None => CancelState::root(deadline),
    };
    let state = Arc::new(state);

    let ctx: ContextRef = Arc::new(CancelContext {
        parent: Arc::clone(parent),
        state: Arc::clone(&state),
    });
    (ctx, CancelFunc { state })
}

/// Derives a context that is done when `cancel` is invoked or `parent` is done.
pub fn with_cancel(parent: &ContextRef) -> (ContextRef, CancelFunc) {
    derive(parent, parent.deadline())
}

/// Derives a context that additionally expires at `deadline`.
///
/// If the parent already expires earlier, the parent's deadline is kept.
/// A deadline in the past yields a context that is already done with
/// [`ContextError::DeadlineExceeded`].
pub fn with_deadline(parent: &ContextRef, deadline: Instant) -> (ContextRef, CancelFunc) {
    let effective = match parent.deadline() {
        Some(inherited) if inherited < deadline => inherited,
        _ => deadline,
    };
    derive(parent, Some(effective))
}

/// Derives a context that expires `timeout` from now.
///
/// A timeout too large to represent as an [`Instant`] sets no deadline of
/// its own, so the context only inherits the parent's.
pub fn with_timeout(parent: &ContextRef, timeout: Duration) -> (ContextRef, CancelFunc) {
    match Instant::now().checked_add(timeout) {
        Some(deadline) => with_deadline(parent, deadline),
        None => derive(parent, parent.deadline()),
    }
}
