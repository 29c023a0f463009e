//! Through params: string pairs forwarded as outgoing metadata.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Shared map of through params.
///
/// Cloning a `ThroughParams` yields another handle to the *same* map:
/// an insert through one handle is visible through every clone. Request
/// contexts derived with
/// [`with_cancel_without_overriding`](crate::with_cancel_without_overriding)
/// share their parent's map this way.
///
/// Keys are lowercased on insert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "HashMap<String, String>", into = "HashMap<String, String>")]
pub struct ThroughParams {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl ThroughParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under the lowercased `key`, returning the replaced value.
    pub fn insert(&self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.inner
            .write()
            .insert(key.as_ref().to_ascii_lowercase(), value.into())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.read().get(&key.to_ascii_lowercase()).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.inner.write().remove(&key.to_ascii_lowercase())
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().contains_key(&key.to_ascii_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Copy of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.inner.read().clone()
    }

    /// Returns `true` if both handles refer to the same map.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<K, V> FromIterator<(K, V)> for ThroughParams
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl From<HashMap<String, String>> for ThroughParams {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<ThroughParams> for HashMap<String, String> {
    fn from(params: ThroughParams) -> Self {
        params.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_lowercased() {
        let params = ThroughParams::new();
        params.insert("X-Tenant", "acme");

        assert_eq!(params.get("x-tenant").as_deref(), Some("acme"));
        assert_eq!(params.get("X-TENANT").as_deref(), Some("acme"));
        assert!(params.snapshot().contains_key("x-tenant"));
    }

    #[test]
    fn insert_returns_replaced_value() {
        let params = ThroughParams::new();
        assert_eq!(params.insert("k", "v1"), None);
        assert_eq!(params.insert("K", "v2").as_deref(), Some("v1"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn clones_alias_the_same_map() {
        let params = ThroughParams::new();
        let alias = params.clone();
        alias.insert("k", "v");

        assert!(params.ptr_eq(&alias));
        assert_eq!(params.get("k").as_deref(), Some("v"));

        alias.remove("k");
        assert!(params.is_empty());
    }

    #[test]
    fn from_map_normalizes_keys() {
        let map = HashMap::from([("Accept-Language".to_string(), "en".to_string())]);
        let params = ThroughParams::from(map);
        assert!(params.contains_key("accept-language"));
        assert_eq!(params.snapshot().keys().next().map(String::as_str), Some("accept-language"));
    }

    #[test]
    fn serializes_as_flat_map() {
        let params: ThroughParams = [("x-tenant", "acme")].into_iter().collect();
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"x-tenant":"acme"}"#);

        let back: ThroughParams = serde_json::from_str(r#"{"X-Region":"eu"}"#).unwrap();
        assert_eq!(back.get("x-region").as_deref(), Some("eu"));
        assert!(!back.ptr_eq(&params));
    }
}
