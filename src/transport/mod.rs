//! Retrying network transport.
//!
//! [`HttpTransport::send`] performs the configured request with a per-attempt
//! timeout, a caller-supplied cancellation handle and bounded exponential
//! backoff. Timeouts, transport failures and 5xx responses are retried up to
//! the config's budget; 4xx responses and cancellation are surfaced
//! immediately. Response bodies are decoded as JSON, text or bytes according
//! to the response content type.

mod http;
mod policy;

pub use http::HttpTransport;
