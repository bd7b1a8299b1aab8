//! Filesystem asset backend.
//!
//! Directory layout:
//! ```text
//! {root}/
//! +-- edX+DemoX+2024/            # course with a run
//! |   +-- asset/
//! |   |   +-- intro.png
//! |   |   +-- intro.png.meta.json  # optional sidecar
//! |   +-- thumbnail/
//! +-- edX+DemoX/                 # legacy course without a run
//!     +-- asset/
//! ```
//!
//! The sidecar is JSON with optional `locked`, `content_type` and
//! `content_digest` fields. Without a sidecar, the content type is guessed
//! from the file extension and small files get an MD5 digest.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cas_key::AssetKey;
use chrono::{DateTime, SubsecRound, Utc};
use md5::{Digest, Md5};
use serde::Deserialize;

use crate::backend::{AssetBackend, BackendError};
use crate::content::{AssetContent, AssetMetadata};

/// Suffix of metadata sidecar files.
pub const META_SUFFIX: &str = ".meta.json";

const BACKEND: &str = "Fs";

/// Sidecar metadata as stored on disk.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Sidecar {
    locked: bool,
    content_type: Option<String>,
    content_digest: Option<String>,
}

/// Asset backend reading from a directory tree.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Create a backend rooted at `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path holding the asset body.
    ///
    /// Key names never contain `.` or `..` segments, so the result always
    /// stays under the root.
    pub fn asset_path(&self, key: &AssetKey) -> PathBuf {
        let course = key.course();
        let course_dir = match course.run() {
            Some(run) => format!("{}+{}+{run}", course.org(), course.course()),
            None => format!("{}+{}", course.org(), course.course()),
        };
        let mut path = self.root.join(course_dir).join(key.kind().as_str());
        for segment in key.name().split('/') {
            path.push(segment);
        }
        path
    }

    async fn read_sidecar(path: &Path, key: &AssetKey) -> Result<Sidecar, BackendError> {
        let mut sidecar_path = path.as_os_str().to_owned();
        sidecar_path.push(META_SUFFIX);
        match tokio::fs::read(&sidecar_path).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                BackendError::malformed(format!("invalid sidecar: {e}"))
                    .with_key(key)
                    .with_backend(BACKEND)
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Sidecar::default()),
            Err(e) => Err(BackendError::io(e).with_key(key).with_backend(BACKEND)),
        }
    }
}

#[async_trait]
impl AssetBackend for FsBackend {
    async fn find(
        &self,
        key: &AssetKey,
        prefer_buffered: bool,
    ) -> Result<AssetContent, BackendError> {
        if key.name().ends_with(META_SUFFIX) {
            return Err(BackendError::not_found(key).with_backend(BACKEND));
        }

        let path = self.asset_path(key);
        let io_err = |e: std::io::Error| BackendError::io(e).with_key(key).with_backend(BACKEND);

        let stat = tokio::fs::metadata(&path).await.map_err(io_err)?;
        if !stat.is_file() {
            return Err(BackendError::not_found(key).with_backend(BACKEND));
        }

        let sidecar = Self::read_sidecar(&path, key).await?;
        let modified: DateTime<Utc> = stat.modified().map_err(io_err)?.into();
        let mut metadata = AssetMetadata {
            content_type: sidecar.content_type.unwrap_or_else(|| {
                mime_guess::from_path(&path)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_owned()
            }),
            content_length: stat.len(),
            last_modified_at: modified.trunc_subsecs(0),
            content_digest: sidecar.content_digest,
            locked: sidecar.locked,
        };

        let wants_bytes = prefer_buffered || metadata.content_digest.is_none();
        if metadata.is_bufferable() && wants_bytes {
            let bytes = tokio::fs::read(&path).await.map_err(io_err)?;
            // The file may have changed between stat and read.
            metadata.content_length = bytes.len() as u64;
            if metadata.content_digest.is_none() {
                metadata.content_digest = Some(hex::encode(Md5::digest(&bytes)));
            }
            tracing::debug!(key = %key, len = bytes.len(), "Read asset into memory");
            return Ok(AssetContent::buffered(metadata, bytes));
        }

        let file = tokio::fs::File::open(&path).await.map_err(io_err)?;
        Ok(AssetContent::streamed(metadata, file))
    }
}
