//! Security headers middleware.
//!
//! Adds security headers to all responses:
//! - X-Content-Type-Options, always `nosniff`
//! - X-Frame-Options, `DENY` unless the response already chose a value
//!
//! Asset responses set `X-Frame-Options: ALLOW` themselves so course
//! content can be embedded; everything else is denied framing.

use axum::http::HeaderValue;
use axum::http::header::{self, HeaderName};
use tower_http::set_header::SetResponseHeaderLayer;

/// Create layer that adds X-Content-Type-Options header.
pub(crate) fn content_type_options_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    )
}

/// Create layer that adds X-Frame-Options header where none is set.
pub(crate) fn frame_options_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"))
}
