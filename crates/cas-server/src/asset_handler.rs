//! The asset request handler.
//!
//! [`AssetHandler`] turns one GET request into a decided [`AssetResponse`]:
//!
//! 1. Paths outside the asset namespaces are not handled (`Ok(None)`).
//! 2. Unparseable asset paths are 400.
//! 3. Content comes from the cache or the backend; unknown keys are 404.
//! 4. A stale version digest redirects (301) to the current one.
//! 5. Locked assets go through the [`AccessGate`]; denial is 403.
//! 6. An exact `If-Modified-Since` match is 304.
//! 7. A single satisfiable byte range is 206, an unsatisfiable one 416.
//! 8. Everything else is a full 200.

use std::sync::Arc;

use axum::http::header::{self, HeaderMap};
use axum::http::{Method, StatusCode, Uri};
use cas_cache::AssetCache;
use cas_config::ConfigProvider;
use cas_key::{AssetKey, ParsedRequest};
use cas_storage::{AssetBackend, AssetBody, AssetContent, AssetMetadata, BackendError};
use tokio::io::AsyncReadExt;
use tracing::field::{Empty, display};
use tracing::{Instrument, Span};

use crate::access::{Access, AccessGate, Principal};
use crate::clock::Clock;
use crate::range::{self, RangeResolution};
use crate::response::{AssetResponse, ResponseBody, ResponseBuilder, http_date};

/// The parts of an HTTP request the handler looks at.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub method: Method,
    /// Raw (percent-encoded) request path.
    pub path: String,
    pub if_modified_since: Option<String>,
    pub range: Option<String>,
    pub user_agent: Option<String>,
}

impl AssetRequest {
    /// A plain GET for `path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            if_modified_since: None,
            range: None,
            user_agent: None,
        }
    }

    /// Extract the relevant parts of an HTTP request.
    pub fn from_parts(method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        let text = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        Self {
            method: method.clone(),
            path: uri.path().to_owned(),
            if_modified_since: text(header::IF_MODIFIED_SINCE),
            range: text(header::RANGE),
            user_agent: text(header::USER_AGENT),
        }
    }

    #[must_use]
    pub fn with_if_modified_since(mut self, value: impl Into<String>) -> Self {
        self.if_modified_since = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_range(mut self, value: impl Into<String>) -> Self {
        self.range = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, value: impl Into<String>) -> Self {
        self.user_agent = Some(value.into());
        self
    }
}

/// Failure the handler cannot express as an asset status code.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Backend I/O failure or malformed stored object.
    #[error("Asset backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Serves course assets.
pub struct AssetHandler {
    cache: Arc<dyn AssetCache>,
    backend: Arc<dyn AssetBackend>,
    config: Arc<dyn ConfigProvider>,
    clock: Arc<dyn Clock>,
    gate: AccessGate,
}

impl AssetHandler {
    pub fn new(
        cache: Arc<dyn AssetCache>,
        backend: Arc<dyn AssetBackend>,
        config: Arc<dyn ConfigProvider>,
        clock: Arc<dyn Clock>,
        gate: AccessGate,
    ) -> Self {
        Self {
            cache,
            backend,
            config,
            clock,
            gate,
        }
    }

    /// Handle `request` on behalf of `principal`.
    ///
    /// Returns `Ok(None)` when the request is not for this handler.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Backend`] when the backend fails for a reason
    /// other than a missing key. Nothing is cached in that case.
    pub async fn handle(
        &self,
        request: &AssetRequest,
        principal: &Principal,
    ) -> Result<Option<AssetResponse>, HandlerError> {
        if request.method != Method::GET || !cas_key::is_asset_path(&request.path) {
            return Ok(None);
        }

        let span = tracing::info_span!(
            "asset_request",
            path = %request.path,
            course_key = Empty,
            asset_name = Empty,
            from_cdn = Empty,
            locked = Empty,
            cacheable = Empty,
            ranged = Empty,
            content_length = Empty,
            content_type = Empty,
        );
        let response = self.serve(request, principal).instrument(span).await?;
        Ok(Some(response))
    }

    /// Drop `key` (and its runless variant) from the cache.
    pub fn invalidate(&self, key: &AssetKey) {
        self.cache.invalidate(key);
    }

    async fn serve(
        &self,
        request: &AssetRequest,
        principal: &Principal,
    ) -> Result<AssetResponse, HandlerError> {
        let span = Span::current();

        let parsed = match cas_key::parse_encoded(&request.path) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting malformed asset path");
                return Ok(AssetResponse::status_only(StatusCode::BAD_REQUEST));
            }
        };
        let key = &parsed.asset_key;
        span.record("course_key", display(key.course()));
        span.record("asset_name", key.name());

        let policy = self.config.policy();
        span.record(
            "from_cdn",
            policy.is_cdn_user_agent(request.user_agent.as_deref()),
        );

        let content = match self.load(key).await {
            Ok(content) => content,
            Err(e) if e.is_not_found() => {
                tracing::debug!("Asset not found");
                return Ok(AssetResponse::status_only(StatusCode::NOT_FOUND));
            }
            Err(e) => {
                tracing::error!(error = %e, transient = e.is_transient(), "Failed to load asset");
                return Err(e.into());
            }
        };
        let (metadata, body) = content.into_parts();
        span.record("locked", metadata.locked);
        span.record("content_length", metadata.content_length);
        span.record("content_type", metadata.content_type.as_str());
        span.record(
            "cacheable",
            !metadata.locked && policy.cache_ttl_seconds > 0,
        );
        span.record("ranged", false);

        if let Some(location) = version_redirect(&parsed, &metadata) {
            tracing::debug!(%location, "Redirecting to current version");
            return Ok(ResponseBuilder::new(StatusCode::MOVED_PERMANENTLY)
                .location(&location)
                .finish(ResponseBody::Empty));
        }

        if self.gate.check(principal, key, &metadata) == Access::Deny {
            tracing::debug!("Access to locked asset denied");
            return Ok(AssetResponse::status_only(StatusCode::FORBIDDEN));
        }

        let last_modified = http_date(metadata.last_modified_at);
        if request.if_modified_since.as_deref() == Some(last_modified.as_str()) {
            return Ok(ResponseBuilder::new(StatusCode::NOT_MODIFIED)
                .last_modified(&last_modified)
                .vary_origin()
                .finish(ResponseBody::Empty));
        }

        let resolution = range::resolve(request.range.as_deref(), metadata.content_length);
        if matches!(resolution, RangeResolution::Satisfiable { .. }) {
            span.record("ranged", true);
        }

        let (builder, len, body) = match resolution {
            RangeResolution::Unsatisfiable => {
                return Ok(AssetResponse::status_only(
                    StatusCode::RANGE_NOT_SATISFIABLE,
                ));
            }
            RangeResolution::Satisfiable { first, last } => {
                let (len, body) = slice_body(body, first, last - first + 1).await?;
                let builder = ResponseBuilder::new(StatusCode::PARTIAL_CONTENT).header(
                    header::CONTENT_RANGE,
                    &format!("bytes {first}-{last}/{}", metadata.content_length),
                );
                (builder, len, body)
            }
            RangeResolution::NoRange | RangeResolution::Full => {
                let (len, body) = full_body(body, &metadata);
                (ResponseBuilder::new(StatusCode::OK), len, body)
            }
        };

        Ok(builder
            .content(&metadata, &last_modified)
            .caching(metadata.locked, policy.cache_ttl_seconds, self.clock.now())
            .vary_origin()
            .body(len, body))
    }

    /// Fetch from the cache, falling back to the backend.
    ///
    /// Small streamed content is buffered and admitted to the cache once the
    /// backend has handed over the complete body.
    async fn load(&self, key: &AssetKey) -> Result<AssetContent, BackendError> {
        if let Some(hit) = self.cache.get(key) {
            tracing::debug!("Served from cache");
            return Ok(hit);
        }

        let content = self.backend.find(key, true).await?;
        let content = content.copy_to_memory().await?;
        if content.is_buffered() && self.cache.put(key, &content) {
            tracing::debug!("Admitted to cache");
        }
        Ok(content)
    }
}

/// `Location` of the current version, when the client asked for another one.
fn version_redirect(parsed: &ParsedRequest, metadata: &AssetMetadata) -> Option<String> {
    let requested = parsed.requested_digest.as_deref()?;
    let current = metadata.content_digest.as_deref()?;
    (requested != current).then(|| parsed.versioned_location(current))
}

fn full_body(body: AssetBody, metadata: &AssetMetadata) -> (u64, ResponseBody) {
    match body {
        AssetBody::Buffered(bytes) => (bytes.len() as u64, ResponseBody::Buffered(bytes)),
        AssetBody::Streamed(reader) => (metadata.content_length, ResponseBody::Stream(reader)),
    }
}

/// `len` bytes starting at `first`.
///
/// Streamed bodies are advanced past `first` and then limited, so large
/// assets are never held in memory.
async fn slice_body(
    body: AssetBody,
    first: u64,
    len: u64,
) -> Result<(u64, ResponseBody), BackendError> {
    match body {
        AssetBody::Buffered(bytes) => {
            let window = usize::try_from(first)
                .ok()
                .zip(usize::try_from(first + len).ok())
                .filter(|&(_, end)| end <= bytes.len());
            let Some((start, end)) = window else {
                return Err(BackendError::malformed(format!(
                    "range {first}+{len} exceeds buffered body of {} bytes",
                    bytes.len()
                )));
            };
            Ok((len, ResponseBody::Buffered(bytes.slice(start..end))))
        }
        AssetBody::Streamed(mut reader) => {
            let skipped = tokio::io::copy(&mut (&mut reader).take(first), &mut tokio::io::sink())
                .await
                .map_err(BackendError::io)?;
            if skipped != first {
                return Err(BackendError::malformed(format!(
                    "stream ended after {skipped} bytes, range starts at {first}"
                )));
            }
            Ok((len, ResponseBody::Stream(Box::pin(reader.take(len)))))
        }
    }
}
