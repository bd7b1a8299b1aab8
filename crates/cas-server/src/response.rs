//! Asset responses and their header policy.
//!
//! Every header the asset handler emits is set through [`ResponseBuilder`],
//! so the caching and `Vary` rules live in one place.

use std::fmt;

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use cas_storage::{AssetMetadata, AssetReader};
use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::io::ReaderStream;

/// Format of `Last-Modified`, `Expires` and `If-Modified-Since` values.
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format `at` as an HTTP date.
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format(HTTP_DATE_FORMAT).to_string()
}

/// Response body.
pub enum ResponseBody {
    Empty,
    Buffered(Bytes),
    Stream(AssetReader),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A fully decided asset response.
#[derive(Debug)]
pub struct AssetResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl AssetResponse {
    /// Bodiless response with no headers (400, 403, 404, 416).
    pub fn status_only(status: StatusCode) -> Self {
        ResponseBuilder::new(status).finish(ResponseBody::Empty)
    }

    /// Header value as a string, if present and visible ASCII.
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl IntoResponse for AssetResponse {
    fn into_response(self) -> Response {
        let body = match self.body {
            ResponseBody::Empty => Body::empty(),
            ResponseBody::Buffered(bytes) => Body::from(bytes),
            ResponseBody::Stream(reader) => Body::from_stream(ReaderStream::new(reader)),
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Builds an [`AssetResponse`] one header group at a time.
#[derive(Debug)]
pub(crate) struct ResponseBuilder {
    status: StatusCode,
    headers: HeaderMap,
}

impl ResponseBuilder {
    pub(crate) fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
        }
    }

    /// Set `name`, dropping values that are not valid header text.
    pub(crate) fn header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => tracing::warn!(header = %name, value, "Dropping invalid header value"),
        }
        self
    }

    /// `Location` for a redirect.
    pub(crate) fn location(self, location: &str) -> Self {
        self.header(header::LOCATION, location)
    }

    /// Descriptive headers shared by 200 and 206.
    pub(crate) fn content(self, metadata: &AssetMetadata, last_modified: &str) -> Self {
        self.header(header::CONTENT_TYPE, &metadata.content_type)
            .last_modified(last_modified)
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::X_FRAME_OPTIONS, "ALLOW")
    }

    pub(crate) fn last_modified(self, last_modified: &str) -> Self {
        self.header(header::LAST_MODIFIED, last_modified)
    }

    /// Intermediary caching policy.
    ///
    /// Locked assets are never public. Unlocked assets are public only when
    /// a positive TTL is configured; otherwise no caching headers are sent.
    pub(crate) fn caching(self, locked: bool, ttl_seconds: u32, now: DateTime<Utc>) -> Self {
        if locked {
            return self.header(header::CACHE_CONTROL, "private, no-cache, no-store");
        }
        if ttl_seconds == 0 {
            return self;
        }
        let expires = now + TimeDelta::seconds(i64::from(ttl_seconds));
        self.header(header::EXPIRES, &http_date(expires)).header(
            header::CACHE_CONTROL,
            &format!("public, max-age={ttl_seconds}, s-maxage={ttl_seconds}"),
        )
    }

    /// Force `Vary` to exactly `Origin`, replacing anything set before.
    ///
    /// Must be the last header applied so a CDN keeps CORS and non-CORS
    /// variants apart.
    pub(crate) fn vary_origin(mut self) -> Self {
        self.headers
            .insert(header::VARY, HeaderValue::from_static("Origin"));
        self
    }

    /// Attach a body of `len` bytes.
    pub(crate) fn body(self, len: u64, body: ResponseBody) -> AssetResponse {
        self.header(header::CONTENT_LENGTH, &len.to_string())
            .finish(body)
    }

    pub(crate) fn finish(self, body: ResponseBody) -> AssetResponse {
        AssetResponse {
            status: self.status,
            headers: self.headers,
            body,
        }
    }
}
