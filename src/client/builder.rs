//! Client construction.

use super::core::{ClientInner, RequestClient};
use super::options::ApiResponse;
use super::ClientConfig;
use crate::cache::{CacheConfig, CacheStore, Persistence};
use crate::credentials::CredentialStore;
use crate::interceptors::{BearerAuth, InterceptorPipeline, SessionExpiry};
use crate::telemetry::{noop_sink, MetricsSink};
use crate::transport::HttpTransport;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type SessionHook = Box<dyn Fn() + Send + Sync>;

/// Builder for [`RequestClient`].
///
/// Wires the two cache tiers, the transport, the metrics sink and the
/// default interceptors. `build` must run inside a tokio runtime when the
/// background sweepers are enabled (the default).
pub struct RequestClientBuilder {
    config: ClientConfig,
    short_term: CacheConfig,
    long_term: CacheConfig,
    short_persistence: Option<Box<dyn Persistence<ApiResponse>>>,
    long_persistence: Option<Box<dyn Persistence<ApiResponse>>>,
    metrics: Arc<dyn MetricsSink>,
    credentials: Option<Arc<dyn CredentialStore>>,
    on_session_expired: Option<SessionHook>,
    sweepers: bool,
}

impl RequestClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            short_term: CacheConfig::short_term(),
            long_term: CacheConfig::long_term(),
            short_persistence: None,
            long_persistence: None,
            metrics: noop_sink(),
            credentials: None,
            on_session_expired: None,
            sweepers: true,
        }
    }

    /// Base URL all relative request paths are joined with.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Default per-attempt timeout (10 seconds unless set).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Default retry budget (3 unless set).
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// Delay before the first retry, doubled per attempt (1 second unless set).
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    /// Default TTL for cached responses.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// Disable the response cache by default; per-call options can still
    /// re-enable it.
    pub fn cache_disabled(mut self) -> Self {
        self.config.cache = false;
        self
    }

    pub fn short_term_config(mut self, config: CacheConfig) -> Self {
        self.short_term = config;
        self
    }

    pub fn long_term_config(mut self, config: CacheConfig) -> Self {
        self.long_term = config;
        self
    }

    pub fn short_term_persistence(mut self, persistence: Box<dyn Persistence<ApiResponse>>) -> Self {
        self.short_persistence = Some(persistence);
        self
    }

    pub fn long_term_persistence(mut self, persistence: Box<dyn Persistence<ApiResponse>>) -> Self {
        self.long_persistence = Some(persistence);
        self
    }

    /// Inject a metrics sink. Default is a no-op sink.
    pub fn metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = sink;
        self
    }

    /// Inject a credential store; registers the built-in bearer-auth request
    /// interceptor and the 401 session-expiry error interceptor.
    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Hook fired when a 401 clears the stored credential.
    pub fn on_session_expired(mut self, hook: SessionHook) -> Self {
        self.on_session_expired = Some(hook);
        self
    }

    /// Disable the background expiry sweepers (useful outside a long-lived
    /// runtime).
    pub fn without_sweepers(mut self) -> Self {
        self.sweepers = false;
        self
    }

    pub fn build(self) -> Result<RequestClient> {
        url::Url::parse(&self.config.base_url).map_err(|_| Error::InvalidUrl {
            url: self.config.base_url.clone(),
        })?;

        let short_term = Arc::new(match self.short_persistence {
            Some(persistence) => CacheStore::with_persistence(self.short_term, persistence),
            None => CacheStore::new(self.short_term),
        });
        let long_term = Arc::new(match self.long_persistence {
            Some(persistence) => CacheStore::with_persistence(self.long_term, persistence),
            None => CacheStore::new(self.long_term),
        });
        if self.sweepers {
            Arc::clone(&short_term).start_sweeper();
            Arc::clone(&long_term).start_sweeper();
        }

        let pipeline = InterceptorPipeline::new();
        if let Some(credentials) = self.credentials {
            pipeline.add_request(Arc::new(BearerAuth::new(Arc::clone(&credentials))));
            let hook = self.on_session_expired.unwrap_or_else(|| Box::new(|| {}));
            pipeline.add_error(Arc::new(SessionExpiry::new(credentials, hook)));
        }

        let transport = HttpTransport::new(Arc::clone(&self.metrics))?;

        Ok(RequestClient {
            inner: Arc::new(ClientInner {
                config: self.config,
                transport,
                pipeline,
                short_term,
                long_term,
                pending: Arc::new(Mutex::new(HashMap::new())),
            }),
        })
    }
}

impl Default for RequestClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_rejects_an_invalid_base_url() {
        let result = RequestClientBuilder::new().base_url("not a url").build();
        assert!(matches!(result, Err(Error::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn build_wires_the_default_tiers() {
        let client = RequestClientBuilder::new()
            .base_url("http://localhost:5000/api")
            .without_sweepers()
            .build()
            .unwrap();
        let stats = client.cache_stats();
        assert_eq!(stats.short_term.max_size, 100);
        assert_eq!(stats.long_term.max_size, 50);
    }
}
