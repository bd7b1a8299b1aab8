//! Access control for locked assets.

use cas_key::{AssetKey, CourseKey};
use cas_storage::AssetMetadata;

/// The caller as established by an upstream authentication layer.
///
/// Inserted into request extensions; a request without one is anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    authenticated: bool,
    staff: bool,
    enrollments: Vec<CourseKey>,
}

impl Principal {
    /// Unauthenticated caller.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Authenticated learner enrolled in `enrollments`.
    #[must_use]
    pub fn user(enrollments: Vec<CourseKey>) -> Self {
        Self {
            authenticated: true,
            staff: false,
            enrollments,
        }
    }

    /// Authenticated global staff.
    #[must_use]
    pub fn staff() -> Self {
        Self {
            authenticated: true,
            staff: true,
            enrollments: Vec::new(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn is_staff(&self) -> bool {
        self.staff
    }

    pub fn enrollments(&self) -> &[CourseKey] {
        &self.enrollments
    }

    /// Enrolled in exactly `course`.
    pub fn is_enrolled(&self, course: &CourseKey) -> bool {
        self.enrollments.contains(course)
    }

    /// Enrolled in any run of `course`, ignoring case of org and course.
    pub fn is_enrolled_partially(&self, course: &CourseKey) -> bool {
        self.enrollments
            .iter()
            .any(|enrolled| enrolled.matches_partially(course))
    }
}

/// Access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

/// Decides whether a principal may read an asset.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGate;

impl AccessGate {
    /// Check `principal` against the asset at `key`.
    ///
    /// Unlocked assets are always allowed. Locked ones require staff, or an
    /// enrollment in the owning course; legacy runless keys accept an
    /// enrollment in any run.
    pub fn check(&self, principal: &Principal, key: &AssetKey, metadata: &AssetMetadata) -> Access {
        if !metadata.locked {
            return Access::Allow;
        }
        if !principal.is_authenticated() {
            return Access::Deny;
        }
        if principal.is_staff() {
            return Access::Allow;
        }

        let enrolled = if key.is_legacy() {
            principal.is_enrolled_partially(key.course())
        } else {
            principal.is_enrolled(key.course())
        };
        if enrolled { Access::Allow } else { Access::Deny }
    }
}
