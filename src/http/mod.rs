//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, middleware stack)
//!     → request.rs (request ID, trace span)
//!     → routing::RouteTable dispatch
//!         /img            → img.rs      → pipeline
//!         /test           → simulate.rs
//!         / /status ...   → root.rs
//!     → response.rs (errors → JSON envelope)
//!     → Send to client
//! ```

pub mod img;
pub mod request;
pub mod response;
pub mod root;
pub mod server;
pub mod simulate;

pub use request::X_REQUEST_ID;
pub use response::AppError;
pub use server::{AppState, HttpServer, ServerError};
