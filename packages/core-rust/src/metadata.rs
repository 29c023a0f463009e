//! Transport metadata carried by a context.
//!
//! Outgoing metadata is what an RPC client layer sends as request headers;
//! incoming metadata is what a server layer received. Both travel through
//! the context chain as values under private keys, so attaching metadata
//! never disturbs cancellation or other values.
//!
//! # Key format
//!
//! Keys are header names and are stored lowercase. Values must be
//! representable as header values (visible ASCII, space and tab).

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::context::{Context, ContextRef};
use crate::error::MetadataError;
use crate::value::{value_of, with_value};

/// Multi-valued string metadata. Appending a key that is already present
/// keeps the earlier values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    headers: HeaderMap,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` under the lowercased `key`.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::InvalidKey`] if `key` is not a valid header
    /// name and [`MetadataError::InvalidValue`] if `value` contains bytes a
    /// header cannot carry.
    pub fn append(&mut self, key: &str, value: &str) -> Result<(), MetadataError> {
        let name = HeaderName::from_bytes(key.to_ascii_lowercase().as_bytes()).map_err(|_| {
            MetadataError::InvalidKey {
                key: key.to_string(),
            }
        })?;
        let value = HeaderValue::from_str(value).map_err(|_| MetadataError::InvalidValue {
            key: key.to_string(),
        })?;
        self.headers.append(name, value);
        Ok(())
    }

    /// First value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .get(key.to_ascii_lowercase().as_str())?
            .to_str()
            .ok()
    }

    /// All values stored under `key`, in append order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.headers
            .get_all(key.to_ascii_lowercase().as_str())
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.headers.contains_key(key.to_ascii_lowercase().as_str())
    }

    /// Number of stored values, counting every value of a repeated key.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterates over every `(key, value)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)))
    }

    #[must_use]
    pub fn as_header_map(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn into_header_map(self) -> HeaderMap {
        self.headers
    }
}

impl From<HeaderMap> for Metadata {
    fn from(headers: HeaderMap) -> Self {
        Self { headers }
    }
}

#[derive(Debug, PartialEq)]
struct OutgoingKey;

#[derive(Debug, PartialEq)]
struct IncomingKey;

/// Outgoing metadata visible from `ctx`. Empty if none was attached.
#[must_use]
pub fn outgoing_metadata(ctx: &dyn Context) -> Metadata {
    value_of::<Metadata>(ctx, &OutgoingKey)
        .map(|md| (*md).clone())
        .unwrap_or_default()
}

/// Derives a context whose outgoing metadata is exactly `md`.
pub fn with_outgoing_metadata(ctx: &ContextRef, md: Metadata) -> ContextRef {
    with_value(ctx, OutgoingKey, md)
}

/// Derives a context whose outgoing metadata is the current one plus `key: value`.
///
/// # Errors
///
/// Returns the [`MetadataError`] of [`Metadata::append`]; `ctx` is left as is.
pub fn append_to_outgoing(
    ctx: &ContextRef,
    key: &str,
    value: &str,
) -> Result<ContextRef, MetadataError> {
    let mut md = outgoing_metadata(ctx.as_ref());
    md.append(key, value)?;
    Ok(with_outgoing_metadata(ctx, md))
}

/// Incoming metadata visible from `ctx`. Empty if none was attached.
#[must_use]
pub fn incoming_metadata(ctx: &dyn Context) -> Metadata {
    value_of::<Metadata>(ctx, &IncomingKey)
        .map(|md| (*md).clone())
        .unwrap_or_default()
}

/// Derives a context carrying `md` as the metadata of the call being served.
pub fn with_incoming_metadata(ctx: &ContextRef, md: Metadata) -> ContextRef {
    with_value(ctx, IncomingKey, md)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{background, with_cancel};

    #[test]
    fn append_accumulates_repeated_keys() {
        let mut md = Metadata::new();
        md.append("X-Trace", "a").unwrap();
        md.append("x-trace", "b").unwrap();

        assert_eq!(md.get("x-trace"), Some("a"));
        assert_eq!(md.get_all("X-TRACE"), vec!["a", "b"]);
        assert_eq!(md.len(), 2);
    }

    #[test]
    fn keys_are_lowercased() {
        let mut md = Metadata::new();
        md.append("X-Request-ID", "abc").unwrap();
        let pairs: Vec<_> = md.iter().collect();
        assert_eq!(pairs, vec![("x-request-id", "abc")]);
    }

    #[test]
    fn empty_value_is_allowed() {
        let mut md = Metadata::new();
        md.append("x-request-id", "").unwrap();
        assert_eq!(md.get("x-request-id"), Some(""));
    }

    #[test]
    fn invalid_pairs_are_rejected() {
        let mut md = Metadata::new();
        assert_eq!(
            md.append("bad key", "v"),
            Err(MetadataError::InvalidKey {
                key: "bad key".to_string()
            })
        );
        assert_eq!(
            md.append("k", "line\nbreak"),
            Err(MetadataError::InvalidValue {
                key: "k".to_string()
            })
        );
        assert!(md.is_empty());
    }

    #[test]
    fn outgoing_appends_accumulate_across_contexts() {
        let ctx = append_to_outgoing(&background(), "k1", "v1").unwrap();
        let (ctx, _cancel) = with_cancel(&ctx);
        let ctx = append_to_outgoing(&ctx, "k2", "v2").unwrap();
        let ctx = append_to_outgoing(&ctx, "k1", "v3").unwrap();

        let md = outgoing_metadata(ctx.as_ref());
        assert_eq!(md.get_all("k1"), vec!["v1", "v3"]);
        assert_eq!(md.get("k2"), Some("v2"));
    }

    #[test]
    fn derived_appends_do_not_leak_into_parent() {
        let parent = append_to_outgoing(&background(), "k", "parent").unwrap();
        let _child = append_to_outgoing(&parent, "k", "child").unwrap();

        assert_eq!(outgoing_metadata(parent.as_ref()).get_all("k"), vec!["parent"]);
    }

    #[test]
    fn incoming_and_outgoing_are_separate() {
        let mut md = Metadata::new();
        md.append("x-request-id", "in").unwrap();
        let ctx = with_incoming_metadata(&background(), md);

        assert_eq!(incoming_metadata(ctx.as_ref()).get("x-request-id"), Some("in"));
        assert!(outgoing_metadata(ctx.as_ref()).is_empty());
    }

    #[test]
    fn background_has_no_metadata() {
        assert!(outgoing_metadata(background().as_ref()).is_empty());
        assert!(incoming_metadata(background().as_ref()).is_empty());
    }

    proptest! {
        #[test]
        fn every_appended_pair_is_retrievable(
            pairs in proptest::collection::vec(("[a-z][a-z0-9-]{0,15}", "[ -~]{0,24}"), 0..16)
        ) {
            let mut md = Metadata::new();
            for (key, value) in &pairs {
                md.append(key, value).unwrap();
            }
            prop_assert_eq!(md.len(), pairs.len());
            for (key, value) in &pairs {
                prop_assert!(md.get_all(key).contains(&value.as_str()));
            }
        }
    }
}
