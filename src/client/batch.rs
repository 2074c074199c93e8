//! Batch helpers.
//!
//! Failures are carried per slot: one failing request never aborts the rest
//! of the batch, and results come back in input order.

use super::core::RequestClient;
use super::options::{ApiResponse, Method, RequestOptions};
use crate::Result;

/// One request slot in a batch.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub method: Method,
    pub url: String,
    pub options: RequestOptions,
}

impl BatchRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            options: RequestOptions::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Post, url).with_options(RequestOptions::new().body(body))
    }

    pub fn put(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Put, url).with_options(RequestOptions::new().body(body))
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

impl RequestClient {
    /// Issues all requests concurrently; results are returned in input order
    /// with each slot carrying its own success or failure.
    pub async fn batch(&self, requests: Vec<BatchRequest>) -> Vec<Result<ApiResponse>> {
        let calls = requests.into_iter().map(|request| {
            let BatchRequest {
                method,
                url,
                options,
            } = request;
            async move { self.request(method, &url, options).await }
        });
        futures::future::join_all(calls).await
    }

    /// Like [`RequestClient::batch`], but partitioned into chunks of `limit`:
    /// chunks run sequentially, requests within a chunk concurrently.
    pub async fn batch_with_limit(
        &self,
        requests: Vec<BatchRequest>,
        limit: usize,
    ) -> Vec<Result<ApiResponse>> {
        let limit = limit.max(1);
        let mut results = Vec::with_capacity(requests.len());
        let mut remaining = requests.into_iter();
        loop {
            let chunk: Vec<BatchRequest> = remaining.by_ref().take(limit).collect();
            if chunk.is_empty() {
                break;
            }
            results.extend(self.batch(chunk).await);
        }
        results
    }
}
