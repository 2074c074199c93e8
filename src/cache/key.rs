//! Cache key generation.

use crate::client::Method;
use sha2::{Digest, Sha256};

/// Deterministic fingerprint of a request, used to address cache entries and
/// the in-flight request table.
///
/// Rendered as `METHOD:url` for body-less requests and `METHOD:url:<digest>`
/// otherwise, where the digest is a truncated SHA-256 of the serialized body.
/// Identical inputs always produce the same key; distinct bodies for the same
/// method and URL diverge with negligible collision probability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key: String,
}

impl CacheKey {
    pub fn build(method: Method, url: &str, body: Option<&serde_json::Value>) -> Self {
        let mut key = format!("{}:{}", method, url);
        if let Some(body) = body {
            let serialized = serde_json::to_string(body).unwrap_or_default();
            let mut hasher = Sha256::new();
            hasher.update(serialized.as_bytes());
            let digest = hasher.finalize();
            key.push(':');
            for byte in digest.iter().take(8) {
                key.push_str(&format!("{:02x}", byte));
            }
        }
        Self { key }
    }

    /// Prefix that addresses every cached read of `url` and its sub-paths.
    pub fn read_prefix(url: &str) -> String {
        format!("{}:{}", Method::Get, url)
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.key
    }
}
