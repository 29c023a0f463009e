//! Error types reported by contexts and the metadata carrier.

/// Reason a context's done signal fired.
///
/// Reported by [`Context::err`](crate::Context::err) once the context is done.
/// Descendants observe the reason of the ancestor that ended them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ContextError {
    /// A cancel handle was invoked on this context or one of its ancestors.
    #[error("context canceled")]
    Canceled,
    /// The deadline of this context or one of its ancestors has passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl ContextError {
    /// Returns `true` if the context ended because its deadline passed.
    #[must_use]
    pub fn is_deadline_exceeded(self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }
}

/// Errors from appending a pair to [`Metadata`](crate::Metadata).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("invalid metadata key: {key:?}")]
    InvalidKey { key: String },
    #[error("invalid metadata value for key {key:?}")]
    InvalidValue { key: String },
}
