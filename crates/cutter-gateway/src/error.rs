use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cutter_shortener::ShortenerError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("malformed request body: {0}")]
    BadRequest(String),
    #[error("missing X-User-Id header")]
    Unauthenticated,
    #[error(transparent)]
    Shortener(#[from] ShortenerError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Shortener(err) => match err {
                ShortenerError::InvalidUrl(_)
                | ShortenerError::InvalidShortCode(_)
                | ShortenerError::EmptyBatch
                | ShortenerError::NotFound(_) => StatusCode::BAD_REQUEST,
                ShortenerError::MissingOwner => StatusCode::UNAUTHORIZED,
                ShortenerError::Gone(_) => StatusCode::GONE,
                ShortenerError::Unavailable(_)
                | ShortenerError::QueueFull
                | ShortenerError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
                ShortenerError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
                ShortenerError::CodeSpaceExhausted(_)
                | ShortenerError::Generator(_)
                | ShortenerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
