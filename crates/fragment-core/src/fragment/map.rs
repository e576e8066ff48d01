//! Ordered collection of decoded fragment parameters.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The decoded `key=value` pairs of a URL fragment, in first-seen order.
///
/// Inserting a key that is already present replaces its value but keeps the
/// key's original position, so a fragment such as `a=1&b=2&a=3` yields
/// `{a: "3", b: "2"}`.
///
/// # Example
///
/// ```rust
/// use fragment_core::FragmentMap;
///
/// let mut map = FragmentMap::new();
/// map.insert("access_token", "abc");
/// map.insert("scope", "chat:read");
/// assert_eq!(map.get("scope"), Some("chat:read"));
/// assert_eq!(map.to_fragment_string(), "access_token=abc&scope=chat%3Aread");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentMap {
    entries: IndexMap<String, String>,
}

impl FragmentMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a pair, replacing any earlier value stored under `key`.
    ///
    /// Returns the replaced value, if there was one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the pairs in first-seen key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterates over the keys in first-seen order.
    ///
    /// Useful for logging what was captured without exposing token values.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Percent-encodes the map back into `k1=v1&k2=v2` fragment form.
    ///
    /// The output never contains a leading `#`.  Feeding
    /// `format!("http://localhost/#{}", map.to_fragment_string())` back into
    /// [`crate::parse_request_body`] yields a map equal to `self`.
    pub fn to_fragment_string(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K, V> FromIterator<(K, V)> for FragmentMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for FragmentMap {
    type Item = (String, String);
    type IntoIter = indexmap::map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
