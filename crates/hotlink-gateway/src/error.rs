use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hotlink_core::ShortenerError;
use hotlink_resolver::ResolveError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

pub type Result<T> = std::result::Result<T, AppError>;

/// Errors rendered as `{"error": "..."}` with a matching status code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("short URL not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("service temporarily unavailable")]
    Unavailable,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status_code(), body).into_response()
    }
}

impl From<ShortenerError> for AppError {
    fn from(e: ShortenerError) -> Self {
        match e {
            ShortenerError::InvalidUrl(_)
            | ShortenerError::InvalidShortCode(_)
            | ShortenerError::ReservedAlias(_)
            | ShortenerError::InvalidExpiration(_) => AppError::BadRequest(e.to_string()),
            ShortenerError::AliasConflict(_) => AppError::Conflict(e.to_string()),
            ShortenerError::NotFound => AppError::NotFound,
            ShortenerError::CodeSpaceExhausted(attempts) => {
                error!(attempts, "Short code space exhausted");
                AppError::Unavailable
            }
            ShortenerError::Storage(e) => {
                warn!(error = %e, "Storage failure while handling request");
                AppError::Unavailable
            }
        }
    }
}

impl From<ResolveError> for AppError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::NotFound => AppError::NotFound,
            ResolveError::Unavailable(e) => {
                warn!(error = %e, "Resolution failed");
                AppError::Unavailable
            }
        }
    }
}
