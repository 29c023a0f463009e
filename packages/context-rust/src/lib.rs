//! Request-scoped context: a cancellation context that also carries a request id,
//! through params forwarded as outgoing metadata, and a logger bound to the request id.
//!
//! ```
//! use reqctx::{with_request_id, RequestContext, REQUEST_ID_HEADER};
//!
//! let ctx = RequestContext::new([with_request_id("abc-123")]);
//! assert_eq!(ctx.request_id(), "abc-123");
//! assert_eq!(
//!     ctx.through_params().get(REQUEST_ID_HEADER).as_deref(),
//!     Some("abc-123")
//! );
//! ```

pub mod context;
pub mod derive;
pub mod options;
pub mod params;

pub use context::{RequestContext, REQUEST_ID_HEADER};
pub use derive::{
    with_cancel, with_cancel_without_overriding, with_deadline, with_timeout, with_value,
};
pub use options::{
    new_request_id, with_base, with_generated_request_id, with_incoming, with_logger,
    with_request_id, with_through_params, ContextOption, ContextOptions,
};
pub use params::ThroughParams;
pub use reqctx_core::{
    background, outgoing_metadata, CancelFunc, Context, ContextError, ContextRef, Done, Metadata,
};
