//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     RouteTable::new()
//!     → one axum Router per resource ("/", "/img")
//!     → into_router(): merge "/" and nest the rest
//!     → handed to HttpServer, frozen
//! ```
//!
//! # Design Decisions
//! - Routes are built once at startup, immutable at runtime
//! - No global router; the table is an ordinary value passed to the server
//! - Resources are mounted by path prefix, first registration wins

pub mod router;

pub use router::RouteTable;
