//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::get;
use tower::ServiceBuilder;

use crate::handlers;
use crate::middleware::security;
use crate::state::AppState;

/// Create the application router.
///
/// Asset paths are answered by the asset middleware before routing; the
/// remaining routes only see requests it declined.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health::get_health))
        .route("/_cache/stats", get(handlers::cache::get_cache_stats))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            handlers::assets::serve_assets,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(security::content_type_options_layer())
                .layer(security::frame_options_layer()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use axum::response::Response;
    use cas_cache::{AssetCache, LruAssetCache};
    use cas_config::{ServingPolicy, StaticPolicy};
    use cas_key::{AssetKey, AssetKind, CourseKey};
    use cas_storage::{AssetBackend, AssetMetadata, BackendErrorKind, MemoryBackend};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    use super::*;
    use crate::access::{AccessGate, Principal};
    use crate::asset_handler::AssetHandler;
    use crate::clock::FixedClock;

    const PATH: &str = "/asset-v1:edX+DemoX+2024+type@asset+block@intro.png";

    fn key() -> AssetKey {
        AssetKey::new(
            CourseKey::new("edX", "DemoX", "2024").unwrap(),
            AssetKind::Asset,
            "intro.png",
        )
        .unwrap()
    }

    fn metadata(locked: bool) -> AssetMetadata {
        AssetMetadata {
            content_type: "image/png".to_owned(),
            content_length: 5,
            last_modified_at: Utc.timestamp_opt(0, 0).unwrap(),
            content_digest: None,
            locked,
        }
    }

    fn router(backend: MemoryBackend) -> (Router, Arc<MemoryBackend>) {
        let backend = Arc::new(backend);
        let cache: Arc<dyn AssetCache> = Arc::new(LruAssetCache::default());
        let handler = AssetHandler::new(
            Arc::clone(&cache),
            Arc::clone(&backend) as Arc<dyn AssetBackend>,
            Arc::new(StaticPolicy::new(ServingPolicy {
                cache_ttl_seconds: 300,
                ..ServingPolicy::default()
            })),
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())),
            AccessGate,
        );
        let state = Arc::new(AppState { handler, cache });
        (create_router(state), backend)
    }

    fn with_asset(locked: bool) -> (Router, Arc<MemoryBackend>) {
        router(MemoryBackend::new().with_asset(key(), metadata(locked), &b"hello"[..]))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn header_value<'a>(response: &'a Response, name: &header::HeaderName) -> Option<&'a str> {
        response.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn test_serves_asset() {
        let (app, _) = with_asset(false);
        let response = app.oneshot(get(PATH)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            header_value(&response, &header::CACHE_CONTROL),
            Some("public, max-age=300, s-maxage=300")
        );
        assert_eq!(header_value(&response, &header::X_FRAME_OPTIONS), Some("ALLOW"));
        assert_eq!(
            header_value(&response, &header::X_CONTENT_TYPE_OPTIONS),
            Some("nosniff")
        );
        assert_eq!(body_text(response).await, "hello");
    }

    #[tokio::test]
    async fn test_principal_from_extensions() {
        let (app, _) = with_asset(true);

        let anonymous = app.clone().oneshot(get(PATH)).await.unwrap();
        assert_eq!(anonymous.status(), StatusCode::FORBIDDEN);

        let mut request = get(PATH);
        request.extensions_mut().insert(Principal::staff());
        let staff = app.oneshot(request).await.unwrap();
        assert_eq!(staff.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_range_request() {
        let (app, _) = with_asset(false);
        let request = Request::builder()
            .uri(PATH)
            .header(header::RANGE, "bytes=1-3")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(header_value(&response, &header::CONTENT_RANGE), Some("bytes 1-3/5"));
        assert_eq!(body_text(response).await, "ell");
    }

    #[tokio::test]
    async fn test_missing_asset_is_404_with_security_headers() {
        let (app, _) = router(MemoryBackend::new());
        let response = app.oneshot(get(PATH)).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(header_value(&response, &header::X_FRAME_OPTIONS), Some("DENY"));
        assert_eq!(
            header_value(&response, &header::X_CONTENT_TYPE_OPTIONS),
            Some("nosniff")
        );
    }

    #[tokio::test]
    async fn test_backend_failure_is_json_500() {
        let (app, backend) = with_asset(false);
        backend.fail_with(Some(BackendErrorKind::Timeout));

        let response = app.oneshot(get(PATH)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_non_get_falls_through() {
        let (app, backend) = with_asset(false);
        let request = Request::builder()
            .method("POST")
            .uri(PATH)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(backend.find_count(), 0);
    }

    #[tokio::test]
    async fn test_healthz() {
        let (app, _) = router(MemoryBackend::new());
        let response = app.oneshot(get("/healthz")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_value(&response, &header::X_FRAME_OPTIONS), Some("DENY"));
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_cache_stats() {
        let (app, _) = with_asset(false);
        app.clone().oneshot(get(PATH)).await.unwrap();
        app.clone().oneshot(get(PATH)).await.unwrap();

        let response = app.oneshot(get("/_cache/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["hits"], 1);
        assert_eq!(json["misses"], 1);
        assert_eq!(json["entries"], 1);
        assert_eq!(json["capacity"], 1024);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (app, _) = router(MemoryBackend::new());
        let response = app.oneshot(get("/static/app.js")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
