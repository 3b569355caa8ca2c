//! Security response headers.
//!
//! # Responsibilities
//! - Add `Strict-Transport-Security` to every response
//!
//! # Design Decisions
//! - The header is set unless a handler already chose its own value
//! - Two-year max-age, subdomains included, eligible for preload lists

use axum::http::{header, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

pub const HSTS_POLICY: &str = "max-age=63072000; includeSubDomains; preload";

/// Security-header stage.
pub fn hsts_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static(HSTS_POLICY),
    )
}
