//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (reject oversized bodies with 413)
//!     → handler
//! Outgoing response:
//!     → headers.rs (add X-Content-Type-Options: nosniff)
//! ```
//!
//! # Design Decisions
//! - Fail closed: oversized input is rejected, never truncated
//! - Source URLs are restricted to http/https by the fetcher

pub mod headers;
pub mod limits;
