//! `reqctx` core: cancellation contexts, deadlines, attached values, and transport metadata.

pub mod cancel;
pub mod context;
pub mod error;
pub mod metadata;
pub mod value;

pub use cancel::{with_cancel, with_deadline, with_timeout, CancelContext, CancelFunc};
pub use context::{background, AsAny, Background, Context, ContextRef, Done, Value};
pub use error::{ContextError, MetadataError};
pub use metadata::{
    append_to_outgoing, incoming_metadata, outgoing_metadata, with_incoming_metadata,
    with_outgoing_metadata, Metadata,
};
pub use value::{value_of, with_value, ContextKey, ValueContext};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
