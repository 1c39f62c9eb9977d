//! API error responses
//!
//! Every failure renders as `{"ok": false, "error": <message>, "code": <CODE>}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Error body returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
    pub code: &'static str,
}

/// Request-level failures
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unparseable body or missing required field
    #[error("{0}")]
    BadRequest(String),

    /// Well-formed body with an unusable value
    #[error("{0}")]
    Validation(String),

    /// The embedding backend failed or timed out
    #[error("embedding service unavailable")]
    EmbeddingUnavailable(#[source] casebook_search::Error),

    /// Anything else; details are logged, not returned
    #[error("internal server error")]
    Internal(#[source] casebook_search::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::EmbeddingUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::EmbeddingUnavailable(_) => "EMBEDDING_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<casebook_search::Error> for ApiError {
    fn from(err: casebook_search::Error) -> Self {
        if err.is_embedding_failure() {
            ApiError::EmbeddingUnavailable(err)
        } else {
            ApiError::Internal(err)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::EmbeddingUnavailable(source) => warn!("Embedding failed: {}", source),
            ApiError::Internal(source) => error!("Request failed: {}", source),
            _ => {}
        }

        let body = ErrorBody {
            ok: false,
            error: self.to_string(),
            code: self.code(),
        };
        (self.status(), Json(body)).into_response()
    }
}
