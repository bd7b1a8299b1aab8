//! Request path parsing.
//!
//! Translates a URL path into a [`ParsedRequest`] without any I/O. Three
//! shapes are recognized:
//!
//! ```text
//! legacy     /c4x/<org>/<course>/<kind>/<name>
//! canonical  /asset-v1:<org>+<course>+<run>+type@<kind>+block@<name>
//! versioned  either of the above with /v/<digest> between course and asset,
//!            or /assets/courseware/[v<N>/]<digest> in front of them
//! ```
//!
//! The digest is stripped before the key is built, so versioned and
//! unversioned references to one asset produce the same [`AssetKey`].

use std::sync::LazyLock;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use regex::Regex;

use crate::KeyError;
use crate::key::{AssetKey, AssetKind, CANONICAL_NAMESPACE, CourseKey, LEGACY_TAG};

/// Prefix of versioned paths that carry the digest in front of the asset path.
pub const VERSIONED_PREFIX: &str = "/assets/courseware";

/// Longest digest accepted in a versioned path.
const MAX_DIGEST_LEN: usize = 64;

/// Characters escaped when a path is placed in a `Location` header.
const LOCATION_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

static LEGACY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/c4x/([^/]+)/([^/]+)/(?:v/([^/]+)/)?(asset|thumbnail)/(.+)$")
        .expect("legacy path pattern is valid")
});

static CANONICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/asset-v1:([^+/]+)\+([^+/]+)\+([^+/]+)(?:/v/([^/]+)/|\+)type@(asset|thumbnail)\+block@(.+)$")
        .expect("canonical path pattern is valid")
});

static PREFIXED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/assets/courseware/(?:v\d+/)?([^/]+)(/.+)$")
        .expect("prefixed path pattern is valid")
});

/// Where a versioned path carries its digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionStyle {
    /// `/v/<digest>` between the course and the asset portion.
    #[default]
    Inline,
    /// `/assets/courseware/v1/<digest>` in front of the unversioned path.
    Prefixed,
}

/// Result of parsing an asset request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    /// Key of the requested asset, existence unchecked.
    pub asset_key: AssetKey,
    /// Version fingerprint the client believes is current.
    pub requested_digest: Option<String>,
    /// Shape the digest arrived in (meaningless without a digest).
    pub style: VersionStyle,
}

impl ParsedRequest {
    /// Path of the same asset pinned to `digest`, in the shape the client used.
    pub fn versioned_path(&self, digest: &str) -> String {
        match self.style {
            VersionStyle::Inline => self.asset_key.to_versioned_path(digest),
            VersionStyle::Prefixed => {
                format!("{VERSIONED_PREFIX}/v1/{digest}{}", self.asset_key.to_path())
            }
        }
    }

    /// [`versioned_path`](Self::versioned_path), percent-encoded for a `Location` header.
    pub fn versioned_location(&self, digest: &str) -> String {
        utf8_percent_encode(&self.versioned_path(digest), LOCATION_ESCAPE).to_string()
    }
}

/// Check whether a path belongs to the asset server at all.
///
/// Paths that match but fail to parse are bad requests; paths that do not
/// match are left for other routes.
pub fn is_asset_path(path: &str) -> bool {
    path.starts_with(&format!("/{LEGACY_TAG}/"))
        || path.starts_with(&format!("/{CANONICAL_NAMESPACE}:"))
        || path.starts_with(&format!("{VERSIONED_PREFIX}/"))
        // Clients sometimes escape the namespace colon.
        || path.starts_with(&format!("/{CANONICAL_NAMESPACE}%3A"))
        || path.starts_with(&format!("/{CANONICAL_NAMESPACE}%3a"))
}

/// Percent-decode a raw request path and parse it.
pub fn parse_encoded(raw: &str) -> Result<ParsedRequest, KeyError> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| KeyError::Encoding(raw.to_owned()))?;
    parse(&decoded)
}

/// Parse a decoded request path.
pub fn parse(path: &str) -> Result<ParsedRequest, KeyError> {
    if let Some(caps) = PREFIXED_RE.captures(path) {
        let digest = validate_digest(&caps[1])?;
        let inner = parse_unprefixed(&caps[2])?;
        if inner.requested_digest.is_some() {
            return Err(KeyError::UnrecognizedShape(path.to_owned()));
        }
        return Ok(ParsedRequest {
            asset_key: inner.asset_key,
            requested_digest: Some(digest),
            style: VersionStyle::Prefixed,
        });
    }

    parse_unprefixed(path)
}

fn parse_unprefixed(path: &str) -> Result<ParsedRequest, KeyError> {
    if let Some(caps) = LEGACY_RE.captures(path) {
        let course = CourseKey::legacy(&caps[1], &caps[2])?;
        let digest = caps.get(3).map(|m| validate_digest(m.as_str())).transpose()?;
        let kind: AssetKind = caps[4].parse()?;
        return Ok(ParsedRequest {
            asset_key: AssetKey::new(course, kind, &caps[5])?,
            requested_digest: digest,
            style: VersionStyle::Inline,
        });
    }

    let path = rewrite_block_separator(path);
    if let Some(caps) = CANONICAL_RE.captures(&path) {
        let course = CourseKey::new(&caps[1], &caps[2], &caps[3])?;
        let digest = caps.get(4).map(|m| validate_digest(m.as_str())).transpose()?;
        let kind: AssetKind = caps[5].parse()?;
        return Ok(ParsedRequest {
            asset_key: AssetKey::new(course, kind, &caps[6])?,
            requested_digest: digest,
            style: VersionStyle::Inline,
        });
    }

    Err(KeyError::UnrecognizedShape(path.into_owned()))
}

/// Rewrite the first `+block/` to `+block@` in canonical paths.
///
/// Link rewriting upstream sometimes turns the `@` into a path separator.
/// Only paths that start with the canonical namespace are touched, and
/// those that already carry `+block@` are left alone so that names
/// containing `+block/` survive.
fn rewrite_block_separator(path: &str) -> std::borrow::Cow<'_, str> {
    if path.starts_with(&format!("/{CANONICAL_NAMESPACE}:")) && !path.contains("+block@") {
        std::borrow::Cow::Owned(path.replacen("+block/", "+block@", 1))
    } else {
        std::borrow::Cow::Borrowed(path)
    }
}

fn validate_digest(digest: &str) -> Result<String, KeyError> {
    let valid = !digest.is_empty()
        && digest.len() <= MAX_DIGEST_LEN
        && digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    if valid {
        Ok(digest.to_owned())
    } else {
        Err(KeyError::InvalidDigest(digest.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn canonical_key(name: &str) -> AssetKey {
        AssetKey::new(
            CourseKey::new("edX", "DemoX", "2024").unwrap(),
            AssetKind::Asset,
            name,
        )
        .unwrap()
    }

    fn legacy_key(name: &str) -> AssetKey {
        AssetKey::new(
            CourseKey::legacy("edX", "c1").unwrap(),
            AssetKind::Asset,
            name,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_legacy() {
        let parsed = parse("/c4x/edX/c1/asset/intro.png").unwrap();
        assert_eq!(parsed.asset_key, legacy_key("intro.png"));
        assert_eq!(parsed.requested_digest, None);
        assert!(parsed.asset_key.is_legacy());
    }

    #[test]
    fn test_parse_legacy_thumbnail_with_subdir() {
        let parsed = parse("/c4x/edX/c1/thumbnail/sub/dir/a.jpg").unwrap();
        assert_eq!(parsed.asset_key.kind(), AssetKind::Thumbnail);
        assert_eq!(parsed.asset_key.name(), "sub/dir/a.jpg");
    }

    #[test]
    fn test_parse_canonical() {
        let parsed = parse("/asset-v1:edX+DemoX+2024+type@asset+block@intro.png").unwrap();
        assert_eq!(parsed.asset_key, canonical_key("intro.png"));
        assert_eq!(parsed.requested_digest, None);
    }

    #[test]
    fn test_parse_canonical_block_slash_rewrite() {
        let parsed = parse("/asset-v1:edX+DemoX+2024+type@asset+block/intro.png").unwrap();
        assert_eq!(parsed.asset_key, canonical_key("intro.png"));

        let prefixed =
            parse("/assets/courseware/v1/ab12/asset-v1:edX+DemoX+2024+type@asset+block/intro.png")
                .unwrap();
        assert_eq!(prefixed.asset_key, canonical_key("intro.png"));
    }

    #[test]
    fn test_block_rewrite_skips_legacy_paths() {
        let parsed = parse("/c4x/edX/c1/asset/asset-v1:x+block/y.png").unwrap();
        assert_eq!(parsed.asset_key.name(), "asset-v1:x+block/y.png");
    }

    #[test]
    fn test_block_rewrite_leaves_names_alone() {
        let parsed =
            parse("/asset-v1:edX+DemoX+2024+type@asset+block@x+block/y.png").unwrap();
        assert_eq!(parsed.asset_key.name(), "x+block/y.png");
    }

    #[test]
    fn test_parse_inline_versioned_canonical() {
        let parsed =
            parse("/asset-v1:edX+DemoX+2024/v/aaaa/type@asset+block@intro.png").unwrap();
        assert_eq!(parsed.asset_key, canonical_key("intro.png"));
        assert_eq!(parsed.requested_digest.as_deref(), Some("aaaa"));
        assert_eq!(parsed.style, VersionStyle::Inline);
    }

    #[test]
    fn test_parse_inline_versioned_legacy() {
        let parsed = parse("/c4x/edX/c1/v/0f9e/asset/intro.png").unwrap();
        assert_eq!(parsed.asset_key, legacy_key("intro.png"));
        assert_eq!(parsed.requested_digest.as_deref(), Some("0f9e"));
    }

    #[test]
    fn test_parse_prefixed_versioned() {
        let digest = "d41d8cd98f00b204e9800998ecf8427e";
        let path = format!("/assets/courseware/v1/{digest}/asset-v1:edX+DemoX+2024+type@asset+block@intro.png");
        let parsed = parse(&path).unwrap();
        assert_eq!(parsed.asset_key, canonical_key("intro.png"));
        assert_eq!(parsed.requested_digest.as_deref(), Some(digest));
        assert_eq!(parsed.style, VersionStyle::Prefixed);

        let without_structure = parse(&format!("/assets/courseware/{digest}/c4x/edX/c1/asset/intro.png")).unwrap();
        assert_eq!(without_structure.asset_key, legacy_key("intro.png"));
    }

    #[test]
    fn test_digest_does_not_change_key() {
        let plain = parse("/asset-v1:edX+DemoX+2024+type@asset+block@intro.png").unwrap();
        let inline = parse("/asset-v1:edX+DemoX+2024/v/ab12/type@asset+block@intro.png").unwrap();
        let prefixed =
            parse("/assets/courseware/v1/ab12/asset-v1:edX+DemoX+2024+type@asset+block@intro.png")
                .unwrap();
        assert_eq!(plain.asset_key, inline.asset_key);
        assert_eq!(plain.asset_key, prefixed.asset_key);
    }

    #[test]
    fn test_rejects_malformed() {
        for path in [
            "/c4x/edX/c1/intro.png",
            "/c4x/edX/c1/video/intro.png",
            "/c4x/edX/c1/asset/",
            "/c4x/edX/c1/asset/../secret",
            "/c4x/edX/c1/v/XYZ/asset/intro.png",
            "/c4x/ed X/c1/asset/intro.png",
            "/asset-v1:edX+DemoX+type@asset+block@intro.png",
            "/asset-v1:edX+DemoX+2024+type@video+block@intro.png",
            "/asset-v1:edX+DemoX+2024+type@asset+block@",
            "/assets/courseware/v1/ab12/c4x/edX/c1/v/cd34/asset/intro.png",
            "/assets/courseware/v1/not-hex/c4x/edX/c1/asset/intro.png",
            "/static/intro.png",
        ] {
            assert!(parse(path).is_err(), "{path} should be rejected");
        }
    }

    #[test]
    fn test_rejects_overlong_digest() {
        let digest = "a".repeat(MAX_DIGEST_LEN + 1);
        let path = format!("/c4x/edX/c1/v/{digest}/asset/intro.png");
        assert!(matches!(parse(&path), Err(KeyError::InvalidDigest(_))));
    }

    #[test]
    fn test_round_trip() {
        let keys = [
            canonical_key("intro.png"),
            canonical_key("dir/ünlöck file.png"),
            legacy_key("intro.png"),
            legacy_key("weird+name@x.txt"),
            legacy_key("asset-v1:x+block/y.png"),
            AssetKey::new(
                CourseKey::new("org.x", "CS-101~a", "run:1").unwrap(),
                AssetKind::Thumbnail,
                "t.jpg",
            )
            .unwrap(),
        ];
        for key in keys {
            assert_eq!(parse(&key.to_path()).unwrap().asset_key, key);
            let versioned = parse(&key.to_versioned_path("beef")).unwrap();
            assert_eq!(versioned.asset_key, key);
            assert_eq!(versioned.requested_digest.as_deref(), Some("beef"));
        }
    }

    #[test]
    fn test_parse_encoded() {
        let parsed =
            parse_encoded("/asset-v1%3AedX+DemoX+2024+type@asset+block@%C3%BCnl%C3%B6ck%20a.png")
                .unwrap();
        assert_eq!(parsed.asset_key, canonical_key("ünlöck a.png"));
        assert!(matches!(
            parse_encoded("/c4x/edX/c1/asset/%FF.png"),
            Err(KeyError::Encoding(_))
        ));
    }

    #[test]
    fn test_versioned_location_keeps_style_and_encodes() {
        let inline = parse("/asset-v1:edX+DemoX+2024/v/aaaa/type@asset+block@a b.png").unwrap();
        assert_eq!(
            inline.versioned_location("bbbb"),
            "/asset-v1:edX+DemoX+2024/v/bbbb/type@asset+block@a%20b.png"
        );

        let prefixed = parse("/assets/courseware/v1/aaaa/c4x/edX/c1/asset/intro.png").unwrap();
        assert_eq!(
            prefixed.versioned_location("bbbb"),
            "/assets/courseware/v1/bbbb/c4x/edX/c1/asset/intro.png"
        );
    }

    #[test]
    fn test_is_asset_path() {
        assert!(is_asset_path("/c4x/edX/c1/asset/intro.png"));
        assert!(is_asset_path("/asset-v1:edX+DemoX+2024+type@asset+block@intro.png"));
        assert!(is_asset_path("/asset-v1%3AedX+DemoX+2024+type@asset+block@intro.png"));
        assert!(is_asset_path("/assets/courseware/v1/ab/c4x/edX/c1/asset/intro.png"));
        assert!(is_asset_path("/c4x/garbage"));
        assert!(!is_asset_path("/healthz"));
        assert!(!is_asset_path("/c4xfoo"));
    }
}
