//! Case-normalized header mapping shared by server and client

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header names are stored lowercased, so lookups never depend on the
/// casing a transport happened to use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Header value parsed as an unsigned integer
    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(|v| v.trim().parse().ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    /// Copy every header from `other`, overwriting existing names
    pub fn extend(&mut self, other: &Headers) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate as (lowercased name, value)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name.as_ref(), value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let headers: Headers = [("Tus-Resumable", "1.0.0"), ("UPLOAD-OFFSET", "42")]
            .into_iter()
            .collect();

        assert_eq!(headers.get("tus-resumable"), Some("1.0.0"));
        assert_eq!(headers.get("Upload-Offset"), Some("42"));
        assert_eq!(headers.get_u64("upload-offset"), Some(42));
        assert!(headers.contains("TUS-RESUMABLE"));
    }

    #[test]
    fn test_later_insert_replaces_earlier() {
        let mut headers = Headers::new();
        headers.insert("Upload-Length", "1");
        headers.insert("upload-length", "2");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get_u64("Upload-Length"), Some(2));
    }

    #[test]
    fn test_non_numeric_value_is_not_u64() {
        let headers = Headers::new().with("Upload-Length", "-5");
        assert_eq!(headers.get_u64("upload-length"), None);
    }
}
