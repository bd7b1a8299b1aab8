//! Error types for the HTTP server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::asset_handler::HandlerError;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Asset handler failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Handler(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": e.to_string()}),
            ),
        };

        (status, axum::Json(body)).into_response()
    }
}
