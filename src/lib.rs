//! Image transform service library.
//!
//! Fetches a source image over HTTP, optionally trims and resizes it, and
//! re-encodes it in a negotiated format. Also serves a status/latency
//! simulator and liveness endpoints.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod validation;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
