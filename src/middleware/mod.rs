//! Middleware for auth, observability, and rate limiting.
//!
//! This module provides:
//! - API key authentication
//! - Request logging with latency tracking
//! - Rate limiting per IP address

pub mod api_metrics;
pub mod auth;
pub mod logging;
pub mod rate_limit;

pub use api_metrics::record_api_call;
pub use auth::{require_api_key, ApiKeyState};
pub use logging::{request_logging, request_logging_simple};
pub use rate_limit::{RateLimitConfig, RateLimitLayer};
