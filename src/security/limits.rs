//! Request limits.
//!
//! # Responsibilities
//! - Enforce maximum request body size
//!
//! # Design Decisions
//! - Checked while the body streams in, so large bodies are never buffered
//! - Exceeding the limit returns 413 Payload Too Large

use tower_http::limit::RequestBodyLimitLayer;

use crate::config::SecurityConfig;

/// Layer rejecting request bodies above `max_body_size`.
pub fn body_limit_layer(config: &SecurityConfig) -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(config.max_body_size)
}
