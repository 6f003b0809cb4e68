//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! /img request:
//!     → timeouts.rs (one deadline around fetch + transform)
//!     → on expiry: in-flight fetch and engine futures are dropped
//! ```
//!
//! # Design Decisions
//! - Every transform has a deadline; there are no retries
//! - Deadline errors are distinct from fetch timeouts so both can map to 504
//!   with their own log line

pub mod timeouts;

pub use timeouts::{with_deadline, DeadlineExceeded};
