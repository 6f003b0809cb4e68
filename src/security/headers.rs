//! Security response headers.
//!
//! # Responsibilities
//! - Add `X-Content-Type-Options: nosniff` to every response
//!
//! # Design Decisions
//! - Handlers may set their own value; the layer only fills the gap

use axum::http::{header, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

pub const NOSNIFF: &str = "nosniff";

/// Layer adding `X-Content-Type-Options: nosniff` when absent.
pub fn nosniff_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static(NOSNIFF),
    )
}
