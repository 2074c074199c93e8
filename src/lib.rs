//! # cachefetch
//!
//! A resilient caching HTTP request client: issues requests on behalf of
//! arbitrary callers, applies a pluggable interceptor pipeline, retries
//! transiently-failing requests with exponential backoff, collapses
//! concurrent identical in-flight requests into one network call, and
//! transparently serves/populates a two-tier (short-term and long-term)
//! cache with TTL expiry and LRU eviction.
//!
//! ## Key Features
//!
//! - **Two-tier cache**: short-term (5 min TTL, 100 entries) and long-term
//!   (30 min TTL, 50 entries) [`cache::CacheStore`] instances with LRU
//!   eviction, background expiry sweep and optional JSON-file persistence
//! - **Request dedup**: concurrent identical GETs share one network call
//! - **Retrying transport**: per-attempt timeout, cancellation and bounded
//!   exponential backoff via [`transport::HttpTransport`]
//! - **Interceptors**: ordered request/response/error transforms, including
//!   built-in bearer-auth and 401 session-expiry handling
//! - **Batching**: [`RequestClient::batch`] and
//!   [`RequestClient::batch_with_limit`] with per-slot failure carrying
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cachefetch::{RequestClientBuilder, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() -> cachefetch::Result<()> {
//!     let client = RequestClientBuilder::new()
//!         .base_url("http://127.0.0.1:5000/api")
//!         .build()?;
//!
//!     // served from cache on the second call
//!     let projects = client.get("/projects", RequestOptions::new()).await?;
//!     println!("status {}", projects.status);
//!
//!     client.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Orchestrator, builder, batch helpers, request/response types |
//! | [`cache`] | TTL + LRU stores, cache keys, persistence backends |
//! | [`transport`] | Retrying HTTP transport |
//! | [`interceptors`] | Interceptor trait, pipeline and built-ins |
//! | [`credentials`] | Bearer credential storage |
//! | [`telemetry`] | Per-attempt call metrics sinks |

pub mod cache;
pub mod client;
pub mod credentials;
pub mod interceptors;
pub mod telemetry;
pub mod transport;

mod error;

pub use client::{
    ApiResponse, BatchRequest, CacheTierStats, ClientConfig, Method, RequestClient,
    RequestClientBuilder, RequestConfig, RequestOptions, ResponseBody,
};
pub use error::Error;

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, Error>;
