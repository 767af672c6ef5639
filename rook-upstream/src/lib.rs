//! rook upstream: the rate-limited member API fetcher
//!
//! Every call first takes a permit from a shared token bucket, then issues
//! the HTTP request with its own timeout. Both steps give up at the
//! caller's [`RequestContext`](rook_core::RequestContext) deadline.

pub mod client;
pub mod config;
pub mod limiter;
pub mod source;

pub use client::UpstreamClient;
pub use config::{UpstreamConfig, DEFAULT_BASE_URL, DEFAULT_RATE_LIMIT, DEFAULT_TIMEOUT};
pub use limiter::RequestLimiter;
pub use source::PlayerSource;
