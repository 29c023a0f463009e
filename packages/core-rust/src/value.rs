//! Value-carrying contexts.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::context::{Context, ContextRef, Done, Value};
use crate::error::ContextError;

/// Key for [`with_value`].
///
/// Implemented for every comparable `'static` type. Two keys match only when
/// their concrete types are the same, so a dedicated key type per use
/// (typically a unit struct) cannot collide with keys of unrelated
/// components, even when their values print the same.
pub trait ContextKey: Any + Send + Sync + fmt::Debug {
    /// Returns `true` if `other` is a key of the same type that compares equal.
    fn matches(&self, other: &dyn Any) -> bool;
}

impl<K> ContextKey for K
where
    K: Any + PartialEq + Send + Sync + fmt::Debug,
{
    fn matches(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<K>().is_some_and(|other| other == self)
    }
}

/// Context derived with [`with_value`]: the parent plus one key/value pair.
pub struct ValueContext {
    parent: ContextRef,
    key: Box<dyn ContextKey>,
    value: Value,
}

impl fmt::Debug for ValueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueContext")
            .field("parent", &self.parent)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl Context for ValueContext {
    fn deadline(&self) -> Option<Instant> {
        self.parent.deadline()
    }

    fn done(&self) -> Done {
        self.parent.done()
    }

    fn err(&self) -> Option<ContextError> {
        self.parent.err()
    }

    fn value(&self, key: &dyn Any) -> Option<Value> {
        if self.key.matches(key) {
            return Some(Arc::clone(&self.value));
        }
        self.parent.value(key)
    }
}

/// Derives a context in which `key` maps to `value`.
///
/// The derived context shares the parent's deadline and done signal. A key
/// attached closer to the leaf shadows the same key further up the chain.
pub fn with_value<K, V>(parent: &ContextRef, key: K, value: V) -> ContextRef
where
    K: ContextKey,
    V: Any + Send + Sync,
{
    Arc::new(ValueContext {
        parent: Arc::clone(parent),
        key: Box::new(key),
        value: Arc::new(value),
    })
}

/// Looks up `key` and downcasts the value to `V`.
///
/// Returns `None` if the key is absent or maps to a value of another type.
#[must_use]
pub fn value_of<V>(ctx: &dyn Context, key: &dyn Any) -> Option<Arc<V>>
where
    V: Any + Send + Sync,
{
    ctx.value(key)?.downcast::<V>().ok()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{background, with_cancel, with_timeout};

    #[derive(Debug, PartialEq)]
    struct UserKey;

    #[derive(Debug, PartialEq)]
    struct TenantKey;

    #[derive(Debug, PartialEq)]
    struct Named(&'static str);

    #[test]
    fn value_found_through_derivations() {
        let ctx = with_value(&background(), UserKey, "alice".to_string());
        let (ctx, _cancel) = with_cancel(&ctx);
        let (ctx, _cancel) = with_timeout(&ctx, Duration::from_secs(5));

        let user = value_of::<String>(ctx.as_ref(), &UserKey).expect("user attached");
        assert_eq!(user.as_str(), "alice");
    }

    #[test]
    fn distinct_key_types_never_collide() {
        let ctx = with_value(&background(), UserKey, 1_u32);
        assert!(ctx.value(&TenantKey).is_none());
        // A plain string with the same spelling is a different key type too.
        assert!(ctx.value(&"UserKey").is_none());
    }

    #[test]
    fn keys_of_same_type_compare_by_value() {
        let ctx = with_value(&background(), Named("a"), 1_u32);
        let ctx = with_value(&ctx, Named("b"), 2_u32);

        assert_eq!(value_of::<u32>(ctx.as_ref(), &Named("a")).as_deref(), Some(&1));
        assert_eq!(value_of::<u32>(ctx.as_ref(), &Named("b")).as_deref(), Some(&2));
        assert!(ctx.value(&Named("c")).is_none());
    }

    #[test]
    fn nearer_value_shadows_outer_value() {
        let ctx = with_value(&background(), UserKey, "outer");
        let ctx = with_value(&ctx, UserKey, "inner");
        assert_eq!(
            value_of::<&str>(ctx.as_ref(), &UserKey).as_deref(),
            Some(&"inner")
        );
    }

    #[test]
    fn wrong_value_type_is_none() {
        let ctx = with_value(&background(), UserKey, 7_i64);
        assert!(value_of::<String>(ctx.as_ref(), &UserKey).is_none());
    }

    #[test]
    fn value_context_forwards_cancellation() {
        let (parent, cancel) = with_cancel(&background());
        let ctx = with_value(&parent, UserKey, ());

        cancel.cancel();
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
        assert!(ctx.done().is_done());
    }
}
