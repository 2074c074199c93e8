//! HTTP transport over reqwest.

use super::policy::{retry_loop, RetryPolicy};
use crate::client::{ApiResponse, Method, RequestConfig, ResponseBody};
use crate::telemetry::MetricsSink;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Performs the actual network calls: per-attempt timeout, cancellation and
/// bounded exponential-backoff retry, with every attempt reported to the
/// metrics sink.
pub struct HttpTransport {
    client: reqwest::Client,
    metrics: Arc<dyn MetricsSink>,
}

impl HttpTransport {
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Result<Self> {
        // Attempt timeouts are enforced here with tokio timers, not in
        // reqwest, so a per-call override needs no client rebuild.
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|err| Error::Network {
                message: err.to_string(),
            })?;
        Ok(Self { client, metrics })
    }

    /// Sends the request, retrying transient failures per the config's retry
    /// budget. Non-2xx responses surface as [`Error::HttpStatus`].
    pub async fn send(&self, config: &RequestConfig) -> Result<ApiResponse> {
        let policy = RetryPolicy::new(config.retries, config.retry_delay);
        retry_loop(&policy, &config.cancel, |_| async {
            let start = Instant::now();
            let result = self.attempt_once(config).await;
            self.metrics
                .record_call(&config.url, start.elapsed(), result.is_ok());
            result
        })
        .await
    }

    /// One attempt: races the request against the attempt timeout and the
    /// caller's cancellation handle.
    async fn attempt_once(&self, config: &RequestConfig) -> Result<ApiResponse> {
        tokio::select! {
            _ = config.cancel.cancelled() => Err(Error::Cancelled),
            outcome = tokio::time::timeout(config.timeout, self.perform(config)) => {
                match outcome {
                    Err(_) => Err(Error::Timeout { ms: config.timeout.as_millis() as u64 }),
                    Ok(result) => result,
                }
            }
        }
    }

    async fn perform(&self, config: &RequestConfig) -> Result<ApiResponse> {
        let method = match config.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut request = self
            .client
            .request(method, &config.url)
            .header("x-request-id", Uuid::new_v4().to_string());
        for (name, value) in &config.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &config.body {
            if !config.method.is_read_only() {
                request = request.json(body);
            }
        }

        let response = request.send().await.map_err(Error::from_reqwest)?;
        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or("").to_string();

        if !status.is_success() {
            let body = response.text().await.ok().filter(|b| !b.is_empty());
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                status_text,
                body,
            });
        }

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let content_type = headers.get("content-type").cloned().unwrap_or_default();
        let data = if content_type.contains("application/json") {
            ResponseBody::Json(response.json().await.map_err(Error::from_reqwest)?)
        } else if content_type.starts_with("text/") {
            ResponseBody::Text(response.text().await.map_err(Error::from_reqwest)?)
        } else {
            let bytes = response.bytes().await.map_err(Error::from_reqwest)?;
            if bytes.is_empty() {
                ResponseBody::Empty
            } else {
                ResponseBody::Binary(bytes)
            }
        };

        Ok(ApiResponse {
            data,
            status: status.as_u16(),
            status_text,
            headers,
            from_cache: false,
        })
    }
}
