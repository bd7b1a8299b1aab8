//! Asset serving middleware.
//!
//! Runs every request past the [`AssetHandler`](crate::AssetHandler). Paths
//! it does not claim continue to the router's own routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::access::Principal;
use crate::asset_handler::AssetRequest;
use crate::error::ServerError;
use crate::state::AppState;

/// Serve course assets, falling through to `next` for everything else.
///
/// The caller's [`Principal`] is taken from request extensions, where an
/// authentication layer in front of this one puts it.
pub(crate) async fn serve_assets(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let asset_request = AssetRequest::from_parts(request.method(), request.uri(), request.headers());
    let principal = request
        .extensions()
        .get::<Principal>()
        .cloned()
        .unwrap_or_default();

    match state.handler.handle(&asset_request, &principal).await {
        Ok(Some(response)) => response.into_response(),
        Ok(None) => next.run(request).await,
        Err(e) => ServerError::from(e).into_response(),
    }
}
