//! Course and asset identifiers.
//!
//! An [`AssetKey`] names one stored asset inside a course. It serializes to
//! exactly one URL path: keys whose course carries a run use the canonical
//! opaque-key shape, runless keys use the legacy shape. Parsing that path
//! again yields the same key.

use std::fmt;
use std::str::FromStr;

use crate::KeyError;

/// Top-level tag of the legacy path shape (`/c4x/...`).
pub const LEGACY_TAG: &str = "c4x";

/// Namespace marker of the canonical path shape (`/asset-v1:...`).
pub const CANONICAL_NAMESPACE: &str = "asset-v1";

/// Course reference.
///
/// Legacy courses have no run. The absence is kept explicitly so that a
/// runless key never compares equal to any key with a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CourseKey {
    org: String,
    course: String,
    run: Option<String>,
}

impl CourseKey {
    /// Create a course key with a run.
    pub fn new(org: &str, course: &str, run: &str) -> Result<Self, KeyError> {
        Self::build(org, course, Some(run))
    }

    /// Create a legacy course key without a run.
    pub fn legacy(org: &str, course: &str) -> Result<Self, KeyError> {
        Self::build(org, course, None)
    }

    fn build(org: &str, course: &str, run: Option<&str>) -> Result<Self, KeyError> {
        for part in [Some(org), Some(course), run].into_iter().flatten() {
            if !is_valid_id(part) {
                return Err(KeyError::InvalidCourse(part.to_owned()));
            }
        }
        Ok(Self {
            org: org.to_owned(),
            course: course.to_owned(),
            run: run.map(str::to_owned),
        })
    }

    /// Organization component.
    pub fn org(&self) -> &str {
        &self.org
    }

    /// Course number component.
    pub fn course(&self) -> &str {
        &self.course
    }

    /// Run component, `None` for legacy courses.
    pub fn run(&self) -> Option<&str> {
        self.run.as_deref()
    }

    /// True when the key has no run.
    pub fn is_legacy(&self) -> bool {
        self.run.is_none()
    }

    /// The same course with the run slot emptied.
    #[must_use]
    pub fn without_run(&self) -> Self {
        Self {
            org: self.org.clone(),
            course: self.course.clone(),
            run: None,
        }
    }

    /// Compare org and course case-insensitively, ignoring the run.
    ///
    /// This is the match legacy enrollment lookups use.
    pub fn matches_partially(&self, other: &Self) -> bool {
        self.org.to_lowercase() == other.org.to_lowercase()
            && self.course.to_lowercase() == other.course.to_lowercase()
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.run {
            Some(run) => write!(f, "course-v1:{}+{}+{run}", self.org, self.course),
            None => write!(f, "{}/{}", self.org, self.course),
        }
    }
}

/// Category of a stored asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// A course file uploaded by staff.
    Asset,
    /// A generated thumbnail of an asset.
    Thumbnail,
}

impl AssetKind {
    /// Path token for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Thumbnail => "thumbnail",
        }
    }
}

impl FromStr for AssetKind {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asset" => Ok(Self::Asset),
            "thumbnail" => Ok(Self::Thumbnail),
            other => Err(KeyError::UnrecognizedShape(other.to_owned())),
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical identifier of an asset within a course.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetKey {
    course: CourseKey,
    kind: AssetKind,
    name: String,
}

impl AssetKey {
    /// Create an asset key, validating the name.
    pub fn new(course: CourseKey, kind: AssetKind, name: &str) -> Result<Self, KeyError> {
        if !is_valid_name(name) {
            return Err(KeyError::InvalidName(name.to_owned()));
        }
        Ok(Self {
            course,
            kind,
            name: name.to_owned(),
        })
    }

    /// Course the asset belongs to.
    pub fn course(&self) -> &CourseKey {
        &self.course
    }

    /// Asset category.
    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// Asset name, possibly containing `/`-separated segments.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the course reference has no run.
    pub fn is_legacy(&self) -> bool {
        self.course.is_legacy()
    }

    /// The same asset under the runless course reference.
    #[must_use]
    pub fn without_run(&self) -> Self {
        Self {
            course: self.course.without_run(),
            kind: self.kind,
            name: self.name.clone(),
        }
    }

    /// Unversioned URL path (not percent-encoded).
    pub fn to_path(&self) -> String {
        self.path_with(None)
    }

    /// URL path with an inline `/v/<digest>` segment (not percent-encoded).
    pub fn to_versioned_path(&self, digest: &str) -> String {
        self.path_with(Some(digest))
    }

    fn path_with(&self, digest: Option<&str>) -> String {
        let CourseKey { org, course, run } = &self.course;
        let kind = self.kind;
        let name = &self.name;
        match (run, digest) {
            (Some(run), None) => {
                format!("/{CANONICAL_NAMESPACE}:{org}+{course}+{run}+type@{kind}+block@{name}")
            }
            (Some(run), Some(d)) => {
                format!("/{CANONICAL_NAMESPACE}:{org}+{course}+{run}/v/{d}/type@{kind}+block@{name}")
            }
            (None, None) => format!("/{LEGACY_TAG}/{org}/{course}/{kind}/{name}"),
            (None, Some(d)) => format!("/{LEGACY_TAG}/{org}/{course}/v/{d}/{kind}/{name}"),
        }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_path().trim_start_matches('/'))
    }
}

/// Org, course and run: word characters plus `-`, `~`, `.`, `:`.
pub(crate) fn is_valid_id(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '~' | '.' | ':'))
}

/// Names: non-empty segments, no `.`/`..`, no control characters.
pub(crate) fn is_valid_name(s: &str) -> bool {
    !s.is_empty()
        && !s.chars().any(char::is_control)
        && s
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn course() -> CourseKey {
        CourseKey::new("edX", "DemoX", "2024").unwrap()
    }

    #[test]
    fn test_canonical_path() {
        let key = AssetKey::new(course(), AssetKind::Asset, "intro.png").unwrap();
        assert_eq!(key.to_path(), "/asset-v1:edX+DemoX+2024+type@asset+block@intro.png");
        assert_eq!(
            key.to_versioned_path("abcd"),
            "/asset-v1:edX+DemoX+2024/v/abcd/type@asset+block@intro.png"
        );
    }

    #[test]
    fn test_legacy_path() {
        let course = CourseKey::legacy("edX", "DemoX").unwrap();
        let key = AssetKey::new(course, AssetKind::Thumbnail, "intro.jpg").unwrap();
        assert_eq!(key.to_path(), "/c4x/edX/DemoX/thumbnail/intro.jpg");
        assert_eq!(key.to_versioned_path("ff"), "/c4x/edX/DemoX/v/ff/thumbnail/intro.jpg");
        assert!(key.is_legacy());
    }

    #[test]
    fn test_without_run() {
        let key = AssetKey::new(course(), AssetKind::Asset, "a.css").unwrap();
        let runless = key.without_run();
        assert_eq!(runless.course().run(), None);
        assert_eq!(runless.name(), "a.css");
        assert_ne!(key, runless);
        assert_eq!(runless.without_run(), runless);
    }

    #[test]
    fn test_partial_match_ignores_run_and_case() {
        let legacy = CourseKey::legacy("EDX", "demox").unwrap();
        assert!(legacy.matches_partially(&course()));
        let other = CourseKey::new("edX", "Other", "2024").unwrap();
        assert!(!legacy.matches_partially(&other));
    }

    #[test]
    fn test_invalid_parts_rejected() {
        assert!(CourseKey::new("ed X", "DemoX", "2024").is_err());
        assert!(CourseKey::legacy("", "DemoX").is_err());
        assert!(AssetKey::new(course(), AssetKind::Asset, "").is_err());
        assert!(AssetKey::new(course(), AssetKind::Asset, "../etc/passwd").is_err());
        assert!(AssetKey::new(course(), AssetKind::Asset, "a//b").is_err());
        assert!(AssetKey::new(course(), AssetKind::Asset, "a\nb").is_err());
        assert!(AssetKey::new(course(), AssetKind::Asset, "dir/ünlöck file.png").is_ok());
    }

    #[test]
    fn test_course_display() {
        assert_eq!(course().to_string(), "course-v1:edX+DemoX+2024");
        assert_eq!(course().without_run().to_string(), "edX/DemoX");
    }
}
