//! Request client orchestration: cache tiers, in-flight dedup, transport.

use super::options::{ApiResponse, Method, RequestConfig, RequestOptions};
use crate::cache::{CacheKey, CacheStats, CacheStore};
use crate::interceptors::{Interceptor, InterceptorPipeline};
use crate::transport::HttpTransport;
use crate::{Error, Result};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

type SharedResponse = Shared<BoxFuture<'static, Result<ApiResponse>>>;
type PendingTable = Arc<Mutex<HashMap<String, SharedResponse>>>;

/// Client-wide defaults; every field can be overridden per call through
/// [`RequestOptions`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
    pub cache: bool,
    pub cache_ttl: Duration,
    pub long_term_cache: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/api".to_string(),
            timeout: Duration::from_secs(10),
            retries: 3,
            retry_delay: Duration::from_secs(1),
            cache: true,
            cache_ttl: Duration::from_secs(5 * 60),
            long_term_cache: false,
        }
    }
}

/// Combined statistics for both cache tiers.
#[derive(Debug, Clone)]
pub struct CacheTierStats {
    pub short_term: CacheStats,
    pub long_term: CacheStats,
}

/// The resilient caching request client.
///
/// Per call: consult the selected cache tier (reads only), join any identical
/// in-flight request, otherwise run the retrying transport through the
/// interceptor pipeline and populate the cache. Successful mutations
/// invalidate cached reads of the resource in both tiers. Cheap to clone;
/// clones share all state.
#[derive(Clone)]
pub struct RequestClient {
    pub(super) inner: Arc<ClientInner>,
}

pub(super) struct ClientInner {
    pub(super) config: ClientConfig,
    pub(super) transport: HttpTransport,
    pub(super) pipeline: InterceptorPipeline,
    pub(super) short_term: Arc<CacheStore<ApiResponse>>,
    pub(super) long_term: Arc<CacheStore<ApiResponse>>,
    pub(super) pending: PendingTable,
}

/// Removes the pending-table entry when the owning request settles, whether
/// it succeeded, failed or was aborted.
struct PendingGuard {
    pending: PendingTable,
    key: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().unwrap().remove(&self.key);
    }
}

impl RequestClient {
    /// Issues a request with the full pipeline: interceptors, cache, dedup,
    /// retrying transport.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let config = self.inner.resolve_config(method, url, options);
        let config = match self.inner.pipeline.apply_request(config).await {
            Ok(config) => config,
            Err(err) => return Err(self.inner.pipeline.apply_error(err).await),
        };
        let key = CacheKey::build(config.method, &config.url, config.body.as_ref());

        // cache and dedup apply to idempotent reads only
        if config.method.is_read_only() {
            if config.cache {
                if let Some(mut cached) = self.inner.tier(config.long_term_cache).get(key.as_str())
                {
                    debug!(key = %key, "serving response from cache");
                    cached.from_cache = true;
                    return Ok(cached);
                }
            }
            self.inner.clone().dedup_execute(key, config).await
        } else {
            ClientInner::execute(Arc::clone(&self.inner), key, config).await
        }
    }

    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<ApiResponse> {
        self.request(Method::Get, url, options).await
    }

    pub async fn post(
        &self,
        url: &str,
        body: Option<serde_json::Value>,
        mut options: RequestOptions,
    ) -> Result<ApiResponse> {
        if body.is_some() {
            options.body = body;
        }
        self.request(Method::Post, url, options).await
    }

    pub async fn put(
        &self,
        url: &str,
        body: Option<serde_json::Value>,
        mut options: RequestOptions,
    ) -> Result<ApiResponse> {
        if body.is_some() {
            options.body = body;
        }
        self.request(Method::Put, url, options).await
    }

    pub async fn patch(
        &self,
        url: &str,
        body: Option<serde_json::Value>,
        mut options: RequestOptions,
    ) -> Result<ApiResponse> {
        if body.is_some() {
            options.body = body;
        }
        self.request(Method::Patch, url, options).await
    }

    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<ApiResponse> {
        self.request(Method::Delete, url, options).await
    }

    pub fn add_request_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
        self.inner.pipeline.add_request(interceptor);
    }

    pub fn add_response_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
        self.inner.pipeline.add_response(interceptor);
    }

    pub fn add_error_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
        self.inner.pipeline.add_error(interceptor);
    }

    /// Short-term cache tier, for direct use (`warmup`, `get_or_set`, …).
    pub fn short_term_cache(&self) -> &Arc<CacheStore<ApiResponse>> {
        &self.inner.short_term
    }

    /// Long-term cache tier.
    pub fn long_term_cache(&self) -> &Arc<CacheStore<ApiResponse>> {
        &self.inner.long_term
    }

    /// Clears both cache tiers, persistence mirrors included.
    pub fn clear_cache(&self) {
        self.inner.short_term.clear();
        self.inner.long_term.clear();
    }

    pub fn cache_stats(&self) -> CacheTierStats {
        CacheTierStats {
            short_term: self.inner.short_term.stats(),
            long_term: self.inner.long_term.stats(),
        }
    }

    /// Stops the background cache sweepers. Call once at process shutdown.
    pub fn shutdown(&self) {
        self.inner.short_term.shutdown();
        self.inner.long_term.shutdown();
    }
}

impl ClientInner {
    pub(super) fn tier(&self, long_term: bool) -> &Arc<CacheStore<ApiResponse>> {
        if long_term {
            &self.long_term
        } else {
            &self.short_term
        }
    }

    fn resolve_config(&self, method: Method, url: &str, options: RequestOptions) -> RequestConfig {
        let defaults = &self.config;
        RequestConfig {
            method,
            url: build_url(&defaults.base_url, url),
            headers: options.headers,
            body: options.body,
            cache: options.cache.unwrap_or(defaults.cache),
            cache_ttl: options.cache_ttl.unwrap_or(defaults.cache_ttl),
            long_term_cache: options.long_term_cache.unwrap_or(defaults.long_term_cache),
            timeout: options.timeout.unwrap_or(defaults.timeout),
            retries: options.retries.unwrap_or(defaults.retries),
            retry_delay: options.retry_delay.unwrap_or(defaults.retry_delay),
            cancel: options.cancel.unwrap_or_default(),
        }
    }

    /// Collapses concurrent identical reads onto one network call.
    ///
    /// Check-then-register happens inside a single lock acquisition with no
    /// await point, so two callers can never both become the leader for a
    /// key. The leader runs as a spawned task: a caller that drops its future
    /// cannot stall the other waiters, and the pending entry is removed by a
    /// drop guard however the task ends.
    async fn dedup_execute(self: Arc<Self>, key: CacheKey, config: RequestConfig) -> Result<ApiResponse> {
        let key_str = key.as_str().to_string();
        let shared = {
            let mut pending = self.pending.lock().unwrap();
            if let Some(existing) = pending.get(&key_str) {
                debug!(key = %key_str, "joining in-flight request");
                existing.clone()
            } else {
                let inner = Arc::clone(&self);
                let guard_key = key_str.clone();
                let handle = tokio::spawn(async move {
                    let _guard = PendingGuard {
                        pending: Arc::clone(&inner.pending),
                        key: guard_key,
                    };
                    ClientInner::execute(inner, key, config).await
                });
                let shared: SharedResponse = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(err) => Err(Error::Network {
                            message: format!("request task failed: {}", err),
                        }),
                    }
                }
                .boxed()
                .shared();
                pending.insert(key_str, shared.clone());
                shared
            }
        };
        shared.await
    }

    /// Transport call plus response/error interceptors and cache maintenance.
    async fn execute(inner: Arc<Self>, key: CacheKey, config: RequestConfig) -> Result<ApiResponse> {
        let outcome = match inner.transport.send(&config).await {
            Ok(response) => inner.pipeline.apply_response(response).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(response) => {
                if config.method.is_read_only() {
                    // only successful reads are cached
                    if config.cache && response.is_success() {
                        inner.tier(config.long_term_cache).set(
                            key.as_str(),
                            response.clone(),
                            Some(config.cache_ttl),
                        );
                    }
                } else if response.is_success() {
                    // a successful mutation means cached reads of this
                    // resource (and its sub-paths) are stale in either tier
                    let prefix = CacheKey::read_prefix(&config.url);
                    let removed = inner.short_term.invalidate_prefix(&prefix)
                        + inner.long_term.invalidate_prefix(&prefix);
                    if removed > 0 {
                        debug!(url = %config.url, removed, "invalidated cached reads after mutation");
                    }
                }
                Ok(response)
            }
            Err(err) => Err(inner.pipeline.apply_error(err).await),
        }
    }
}

/// Joins a relative path with the base URL; absolute URLs pass through.
fn build_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
