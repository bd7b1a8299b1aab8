//! Backend trait and error types.
//!
//! Provides the [`AssetBackend`] trait the asset handler fetches content
//! through, along with [`BackendError`] for unified error handling across
//! backends.

use async_trait::async_trait;
use cas_key::AssetKey;

use crate::content::AssetContent;

/// Semantic error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendErrorKind {
    /// Asset key does not resolve to a stored object.
    NotFound,
    /// Backend refused access to the stored object.
    PermissionDenied,
    /// Backend is temporarily unavailable.
    Unavailable,
    /// Operation timed out.
    Timeout,
    /// Stored object or its metadata is malformed.
    Malformed,
    /// Other/unknown error category.
    Other,
}

/// Retry guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorStatus {
    /// Don't retry (not found, malformed object).
    #[default]
    Permanent,
    /// Retry immediately (timeout, connection reset).
    Temporary,
    /// Retry with backoff (service unavailable).
    Persistent,
}

/// Backend error with semantic kind and backend-specific source.
#[derive(Debug)]
pub struct BackendError {
    /// Semantic error category.
    pub kind: BackendErrorKind,
    /// Retry guidance.
    pub status: ErrorStatus,
    /// Asset key context (if applicable).
    pub key: Option<String>,
    /// Backend identifier (e.g., "Fs", "Memory").
    pub backend: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendError {
    /// Create a new backend error.
    #[must_use]
    pub fn new(kind: BackendErrorKind) -> Self {
        Self {
            kind,
            status: ErrorStatus::Permanent,
            key: None,
            backend: None,
            source: None,
        }
    }

    /// Attach asset key context.
    #[must_use]
    pub fn with_key(mut self, key: &AssetKey) -> Self {
        self.key = Some(key.to_string());
        self
    }

    /// Attach backend identifier.
    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set retry status.
    #[must_use]
    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a not found error for a key.
    #[must_use]
    pub fn not_found(key: &AssetKey) -> Self {
        Self::new(BackendErrorKind::NotFound).with_key(key)
    }

    /// Create a malformed-object error with a message.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Malformed).with_source(std::io::Error::other(message.into()))
    }

    /// Create a backend error from an I/O error.
    #[must_use]
    pub fn io(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            // A path segment that is a regular file cannot hold the asset.
            std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory => {
                BackendErrorKind::NotFound
            }
            std::io::ErrorKind::PermissionDenied => BackendErrorKind::PermissionDenied,
            std::io::ErrorKind::TimedOut => BackendErrorKind::Timeout,
            std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof => {
                BackendErrorKind::Malformed
            }
            _ => BackendErrorKind::Other,
        };
        let status = match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted => ErrorStatus::Temporary,
            _ => ErrorStatus::Permanent,
        };
        Self::new(kind).with_status(status).with_source(err)
    }

    /// True when the key does not resolve.
    pub fn is_not_found(&self) -> bool {
        self.kind == BackendErrorKind::NotFound
    }

    /// True when retrying the same call might succeed.
    pub fn is_transient(&self) -> bool {
        self.status != ErrorStatus::Permanent
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "[Backend] Kind: message (key: asset-v1:...)"
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }

        let kind_str = match self.kind {
            BackendErrorKind::NotFound => "Not found",
            BackendErrorKind::PermissionDenied => "Permission denied",
            BackendErrorKind::Unavailable => "Unavailable",
            BackendErrorKind::Timeout => "Timeout",
            BackendErrorKind::Malformed => "Malformed object",
            BackendErrorKind::Other => "Error",
        };

        write!(f, "{kind_str}")?;

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        if let Some(key) = &self.key {
            write!(f, " (key: {key})")?;
        }

        Ok(())
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Object store holding course assets and their metadata.
///
/// `find` is the only call the asset handler makes. It may suspend; the
/// handler never holds a cache lock across it.
#[async_trait]
pub trait AssetBackend: Send + Sync {
    /// Load metadata and content for `key`.
    ///
    /// `prefer_buffered` is a hint: backends return buffered content when
    /// it is cheap to do so (small objects) and a stream otherwise.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] of kind [`BackendErrorKind::NotFound`]
    /// when the key does not resolve, and other kinds for I/O failures or
    /// malformed stored objects.
    async fn find(&self, key: &AssetKey, prefer_buffered: bool)
    -> Result<AssetContent, BackendError>;
}

#[cfg(test)]
mod tests {
    use cas_key::{AssetKind, CourseKey};

    use super::*;

    fn key() -> AssetKey {
        AssetKey::new(
            CourseKey::new("edX", "DemoX", "2024").unwrap(),
            AssetKind::Asset,
            "intro.png",
        )
        .unwrap()
    }

    #[test]
    fn test_not_found_display() {
        let err = BackendError::not_found(&key()).with_backend("Memory");
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "[Memory] Not found (key: asset-v1:edX+DemoX+2024+type@asset+block@intro.png)"
        );
    }

    #[test]
    fn test_io_error_mapping() {
        let err = BackendError::io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.kind, BackendErrorKind::NotFound);
        assert!(!err.is_transient());

        let err = BackendError::io(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            "not a directory",
        ));
        assert!(err.is_not_found());

        let err = BackendError::io(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert_eq!(err.kind, BackendErrorKind::Timeout);
        assert_eq!(err.status, ErrorStatus::Temporary);
        assert!(err.is_transient());
    }

    #[test]
    fn test_malformed_has_source() {
        let err = BackendError::malformed("length mismatch");
        assert_eq!(err.kind, BackendErrorKind::Malformed);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("length mismatch"));
    }
}
