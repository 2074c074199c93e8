//! Request and response types.

use crate::{Error, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// HTTP methods the client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// GET is the only read-only, idempotent method here; everything else is
    /// treated as a mutation for caching and dedup purposes.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call options layered over the client defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
    /// Disable the cache for this call; `None` means "use the client default".
    pub cache: Option<bool>,
    pub cache_ttl: Option<Duration>,
    /// Route cached data to the long-term tier.
    pub long_term_cache: Option<bool>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    /// Caller-supplied cancellation handle; aborts the current attempt and
    /// suppresses further retries.
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.cache = Some(false);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn long_term(mut self) -> Self {
        self.long_term_cache = Some(true);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Fully resolved configuration for one request, as seen by interceptors and
/// the transport.
///
/// Immutable once handed to the transport; request interceptors consume a
/// config and produce a new one, so a config shared with another in-flight
/// call is never mutated.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub method: Method,
    /// Absolute URL, already joined with the client base.
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
    pub cache: bool,
    pub cache_ttl: Duration,
    pub long_term_cache: bool,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
    pub cancel: CancellationToken,
}

/// Response payload, decoded according to the response content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
    Binary(Bytes),
    Empty,
}

impl ResponseBody {
    /// Deserializes a JSON body into a caller-defined type.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            ResponseBody::Json(value) => {
                serde_json::from_value(value.clone()).map_err(Error::serialization)
            }
            _ => Err(Error::Serialization {
                message: "response body is not JSON".to_string(),
            }),
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ResponseBody::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// What callers get back from every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub data: ResponseBody,
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    /// True when the response was served from a cache tier.
    pub from_cache: bool,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
