use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuaestorError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, QuaestorError>;

/// Error type returned by Axum handlers.
///
/// Upstream connector failures never map here — they are recorded on the
/// job itself. Only request-level problems become HTTP errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_)   => StatusCode::NOT_FOUND,
            ApiError::Internal(_)   => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<QuaestorError> for ApiError {
    fn from(e: QuaestorError) -> Self {
        match e {
            QuaestorError::Validation(msg) => ApiError::BadRequest(msg),
            QuaestorError::NotFound(msg)   => ApiError::NotFound(msg),
            other                          => ApiError::Internal(other.to_string()),
        }
    }
}
