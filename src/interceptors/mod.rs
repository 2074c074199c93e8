//! Interceptor hooks applied around every request.
//!
//! One trait with a method per phase: `on_request` rewrites the outgoing
//! config, `on_response` rewrites a successful response before it reaches the
//! cache or the caller, `on_error` translates a failure. Each phase has its
//! own ordered registration list; interceptors run sequentially and later ones
//! see the output of earlier ones.
//!
//! An error interceptor can only transform the error, never cancel the
//! failure path; its return type is `Error`, not `Result`, on purpose.

mod builtin;

pub use builtin::{BearerAuth, SessionExpiry};

use crate::client::{ApiResponse, RequestConfig};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// A registered transform for one or more pipeline phases.
///
/// Every method defaults to the identity, so an implementation only overrides
/// the phases it cares about.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn on_request(&self, config: RequestConfig) -> Result<RequestConfig> {
        Ok(config)
    }

    async fn on_response(&self, response: ApiResponse) -> Result<ApiResponse> {
        Ok(response)
    }

    async fn on_error(&self, error: Error) -> Error {
        error
    }
}

/// Ordered interceptor lists, one per phase.
pub struct InterceptorPipeline {
    request: RwLock<Vec<Arc<dyn Interceptor>>>,
    response: RwLock<Vec<Arc<dyn Interceptor>>>,
    error: RwLock<Vec<Arc<dyn Interceptor>>>,
}

impl InterceptorPipeline {
    pub fn new() -> Self {
        Self {
            request: RwLock::new(Vec::new()),
            response: RwLock::new(Vec::new()),
            error: RwLock::new(Vec::new()),
        }
    }

    pub fn add_request(&self, interceptor: Arc<dyn Interceptor>) {
        self.request.write().unwrap().push(interceptor);
    }

    pub fn add_response(&self, interceptor: Arc<dyn Interceptor>) {
        self.response.write().unwrap().push(interceptor);
    }

    pub fn add_error(&self, interceptor: Arc<dyn Interceptor>) {
        self.error.write().unwrap().push(interceptor);
    }

    pub async fn apply_request(&self, mut config: RequestConfig) -> Result<RequestConfig> {
        // Snapshot the list so a registration during the call cannot block it.
        let interceptors = self.request.read().unwrap().clone();
        for interceptor in interceptors {
            config = interceptor.on_request(config).await?;
        }
        Ok(config)
    }

    pub async fn apply_response(&self, mut response: ApiResponse) -> Result<ApiResponse> {
        let interceptors = self.response.read().unwrap().clone();
        for interceptor in interceptors {
            response = interceptor.on_response(response).await?;
        }
        Ok(response)
    }

    pub async fn apply_error(&self, mut error: Error) -> Error {
        let interceptors = self.error.read().unwrap().clone();
        for interceptor in interceptors {
            error = interceptor.on_error(error).await;
        }
        error
    }
}

impl Default for InterceptorPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Method;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn config() -> RequestConfig {
        RequestConfig {
            method: Method::Get,
            url: "http://localhost/api/projects".into(),
            headers: HashMap::new(),
            body: None,
            cache: true,
            cache_ttl: Duration::from_secs(300),
            long_term_cache: false,
            timeout: Duration::from_secs(10),
            retries: 3,
            retry_delay: Duration::from_secs(1),
            cancel: CancellationToken::new(),
        }
    }

    struct TagHeader(&'static str, &'static str);

    #[async_trait]
    impl Interceptor for TagHeader {
        async fn on_request(&self, mut config: RequestConfig) -> Result<RequestConfig> {
            config.headers.insert(self.0.to_string(), self.1.to_string());
            Ok(config)
        }
    }

    struct AppendTag(&'static str);

    #[async_trait]
    impl Interceptor for AppendTag {
        async fn on_request(&self, mut config: RequestConfig) -> Result<RequestConfig> {
            let tag = config.headers.entry("x-tag".to_string()).or_default();
            tag.push_str(self.0);
            Ok(config)
        }
    }

    struct Translate;

    #[async_trait]
    impl Interceptor for Translate {
        async fn on_error(&self, error: Error) -> Error {
            match error {
                Error::HttpStatus { status: 503, .. } => Error::Network {
                    message: "service unavailable".into(),
                },
                other => other,
            }
        }
    }

    #[tokio::test]
    async fn request_interceptors_run_in_registration_order() {
        let pipeline = InterceptorPipeline::new();
        pipeline.add_request(Arc::new(AppendTag("a")));
        pipeline.add_request(Arc::new(AppendTag("b")));
        let out = pipeline.apply_request(config()).await.unwrap();
        assert_eq!(out.headers["x-tag"], "ab");
    }

    #[tokio::test]
    async fn later_interceptors_see_earlier_output() {
        let pipeline = InterceptorPipeline::new();
        pipeline.add_request(Arc::new(TagHeader("x-first", "1")));
        pipeline.add_request(Arc::new(AppendTag("seen")));
        let out = pipeline.apply_request(config()).await.unwrap();
        assert_eq!(out.headers["x-first"], "1");
        assert_eq!(out.headers["x-tag"], "seen");
    }

    #[tokio::test]
    async fn error_interceptors_transform_but_cannot_swallow() {
        let pipeline = InterceptorPipeline::new();
        pipeline.add_error(Arc::new(Translate));
        let out = pipeline
            .apply_error(Error::HttpStatus {
                status: 503,
                status_text: "Service Unavailable".into(),
                body: None,
            })
            .await;
        assert_eq!(
            out,
            Error::Network {
                message: "service unavailable".into()
            }
        );

        // untouched errors pass through unchanged
        let out = pipeline.apply_error(Error::Cancelled).await;
        assert_eq!(out, Error::Cancelled);
    }
}
