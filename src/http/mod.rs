//! HTTP client module
//!
//! Provides the transport abstraction and a client with retry, rate limiting,
//! and backoff on top of it.
//!
//! # Features
//!
//! - **Transport trait**: any HTTP implementation can back the engine
//! - **Automatic Retries**: bounded retries with backoff for transient failures
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Backoff Strategies**: Constant, linear, and exponential backoff

mod client;
mod rate_limit;
mod transport;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
