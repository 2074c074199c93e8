//! Request client: the orchestrator tying cache, dedup, interceptors and the
//! retrying transport together.
//!
//! Per-call control flow:
//!
//! ```text
//! caller -> RequestClient -> interceptors(request)
//!                         -> cache hit? return
//!                         -> identical request in flight? await it
//!                         -> HttpTransport (retry)
//!                         -> interceptors(response | error)
//!                         -> cache set / invalidate -> caller
//! ```
//!
//! Cache and dedup apply only to GET requests; mutations always reach the
//! transport and, on success, invalidate cached reads of the resource in both
//! tiers.

mod batch;
mod builder;
mod core;
mod options;

pub use batch::BatchRequest;
pub use builder::RequestClientBuilder;
pub use core::{CacheTierStats, ClientConfig, RequestClient};
pub use options::{ApiResponse, Method, RequestConfig, RequestOptions, ResponseBody};
