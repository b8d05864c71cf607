//! Shared library for cross-cutting concerns of the contract testing toolkit.
//!
//! This crate provides centralized implementations for:
//! - Error types with retryability classification
//! - HTTP client configuration and building
//! - Retry policies with exponential backoff
//! - Tracing subscriber initialization
//! - Request counters in Prometheus text format

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod metrics;
pub mod retry;
pub mod tracing_config;

pub use error::PlatformError;
pub use http::{HttpConfig, build_http_client};
pub use metrics::{Counter, render_prometheus};
pub use retry::{RetryConfig, RetryPolicy, Retryable};
pub use tracing_config::{TracingConfig, init_tracing};
