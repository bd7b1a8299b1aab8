//! Course asset keys and request path parsing.
//!
//! This crate is pure: it performs no I/O. It provides:
//!
//! - [`AssetKey`] / [`CourseKey`]: logical identifiers for stored assets
//! - [`parse`] / [`parse_encoded`]: request path to [`ParsedRequest`]
//! - [`is_asset_path`]: cheap check whether a path belongs to the asset server
//!
//! # Example
//!
//! ```
//! use cas_key::parse;
//!
//! let parsed = parse("/asset-v1:edX+DemoX+2024/v/ab12/type@asset+block@intro.png").unwrap();
//! assert_eq!(parsed.requested_digest.as_deref(), Some("ab12"));
//! assert_eq!(
//!     parsed.asset_key.to_path(),
//!     "/asset-v1:edX+DemoX+2024+type@asset+block@intro.png"
//! );
//! ```

mod key;
mod parser;

pub use key::{AssetKey, AssetKind, CANONICAL_NAMESPACE, CourseKey, LEGACY_TAG};
pub use parser::{
    ParsedRequest, VERSIONED_PREFIX, VersionStyle, is_asset_path, parse, parse_encoded,
};

/// Path or key parse error.
///
/// Every variant is a client error; none of them is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// Path is not one of the recognized shapes.
    #[error("Unrecognized asset path: {0}")]
    UnrecognizedShape(String),
    /// Org, course or run contains invalid characters.
    #[error("Invalid course key component: {0}")]
    InvalidCourse(String),
    /// Asset name is empty or contains invalid segments.
    #[error("Invalid asset name: {0}")]
    InvalidName(String),
    /// Version digest is not a short lowercase hex string.
    #[error("Invalid version digest: {0}")]
    InvalidDigest(String),
    /// Path does not percent-decode to UTF-8.
    #[error("Path is not valid UTF-8 after decoding: {0}")]
    Encoding(String),
}
