//! Asset metadata and content representations.

use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::backend::BackendError;

/// Largest content length (exclusive) that is ever buffered in memory or cached.
pub const MAX_CACHEABLE_BYTES: u64 = 1024 * 1024;

/// Metadata stored alongside an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMetadata {
    /// MIME type served as `Content-Type`.
    pub content_type: String,
    /// Body length in bytes.
    pub content_length: u64,
    /// Last modification time, whole seconds.
    pub last_modified_at: DateTime<Utc>,
    /// Short content fingerprint used in versioned URLs.
    pub content_digest: Option<String>,
    /// Access restricted to enrolled learners and staff.
    pub locked: bool,
}

impl AssetMetadata {
    /// True when the content is small enough to buffer and cache.
    pub fn is_bufferable(&self) -> bool {
        self.content_length < MAX_CACHEABLE_BYTES
    }
}

/// One-shot reader over a streamed asset body.
pub type AssetReader = Pin<Box<dyn AsyncRead + Send>>;

/// Asset body: either fully in memory or a reader consumed once.
pub enum AssetBody {
    /// Complete in-memory buffer; cheap to clone and slice.
    Buffered(Bytes),
    /// Opaque reader with length known from metadata.
    Streamed(AssetReader),
}

impl fmt::Debug for AssetBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Self::Streamed(_) => f.write_str("Streamed"),
        }
    }
}

/// Asset metadata together with its body.
#[derive(Debug)]
pub struct AssetContent {
    metadata: AssetMetadata,
    body: AssetBody,
}

impl AssetContent {
    /// Create buffered content.
    pub fn buffered(metadata: AssetMetadata, bytes: impl Into<Bytes>) -> Self {
        Self {
            metadata,
            body: AssetBody::Buffered(bytes.into()),
        }
    }

    /// Create streamed content.
    pub fn streamed(metadata: AssetMetadata, reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            metadata,
            body: AssetBody::Streamed(Box::pin(reader)),
        }
    }

    /// Asset metadata.
    pub fn metadata(&self) -> &AssetMetadata {
        &self.metadata
    }

    /// True when the body is an in-memory buffer.
    pub fn is_buffered(&self) -> bool {
        matches!(self.body, AssetBody::Buffered(_))
    }

    /// The in-memory buffer, if buffered.
    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.body {
            AssetBody::Buffered(bytes) => Some(bytes),
            AssetBody::Streamed(_) => None,
        }
    }

    /// Clone buffered content; streamed content cannot be cloned.
    pub fn try_clone(&self) -> Option<Self> {
        self.bytes()
            .map(|bytes| Self::buffered(self.metadata.clone(), bytes.clone()))
    }

    /// Split into metadata and body.
    pub fn into_parts(self) -> (AssetMetadata, AssetBody) {
        (self.metadata, self.body)
    }

    /// Read a streamed body into memory when it is small enough.
    ///
    /// Content that is already buffered, or too large to buffer, is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an I/O [`BackendError`] if reading fails, and a malformed
    /// error when the stream length disagrees with `content_length`.
    pub async fn copy_to_memory(self) -> Result<Self, BackendError> {
        let Self { metadata, body } = self;
        match body {
            AssetBody::Streamed(reader) if metadata.is_bufferable() => {
                let expected = metadata.content_length;
                // Read one extra byte so an overlong stream is detected.
                let mut limited = reader.take(expected + 1);
                let mut buf = Vec::with_capacity(usize::try_from(expected).unwrap_or_default());
                limited
                    .read_to_end(&mut buf)
                    .await
                    .map_err(BackendError::io)?;
                if buf.len() as u64 != expected {
                    return Err(BackendError::malformed(format!(
                        "stream yielded {} bytes, metadata says {expected}",
                        buf.len()
                    )));
                }
                Ok(Self::buffered(metadata, buf))
            }
            body => Ok(Self { metadata, body }),
        }
    }
}
