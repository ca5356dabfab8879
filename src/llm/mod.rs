//! Completion API client: wire types, rate limiting, and retrying dispatch.

mod client;
mod error;
mod limiter;
mod types;

pub use client::{ApiClient, HttpTransport, Transport};
pub use error::{ApiError, TransportError};
pub use limiter::{LimiterRegistry, Permit, RateLimiter};
pub use types::{Choice, CompletionRequest, CompletionResponse, Usage, WireMessage};
