//! Report errors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type ReportResult<T> = Result<T, ReportError>;

/// Errors from the report store and handlers
#[derive(Debug, Clone, Error)]
pub enum ReportError {
    #[error("Report not found")]
    NotFound,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Access denied")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReportError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound => "REPORT_NOT_FOUND",
            Self::Unauthenticated => "AUTH_REQUIRED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Forbidden => "ACCESS_DENIED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "report error: {}", self);
        }
        let error = match &self {
            Self::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        };
        let body = ErrorResponse {
            error,
            code: self.error_code(),
        };
        (status, Json(body)).into_response()
    }
}
