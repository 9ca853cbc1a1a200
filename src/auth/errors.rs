//! # Auth Errors
//!
//! Error taxonomy for the authentication core. External messages for
//! credential failures stay deliberately vague to prevent account
//! enumeration; the internal cause is logged separately.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication errors
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Unknown email or wrong password. One variant for both causes,
    /// so the response body cannot be used to enumerate accounts.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No session presented where one is required
    #[error("Authentication required")]
    Unauthenticated,

    /// Password matched but the account email was never verified
    #[error("Email not verified")]
    EmailNotVerified,

    /// Account temporarily locked after repeated failed logins
    #[error("Account is temporarily locked")]
    AccountLocked,

    /// Token `exp` is in the past
    #[error("Token expired")]
    TokenExpired,

    /// Token could not be decoded
    #[error("Malformed token")]
    TokenMalformed,

    /// Token signature did not verify
    #[error("Invalid token signature")]
    BadSignature,

    /// Token `iat` is in the future (clock tampering heuristic)
    #[error("Token issued in the future")]
    TokenIssuedInFuture,

    /// Rate limit tripped on the login path
    #[error("Too many login attempts. Please try again later.")]
    TooManyAttempts,

    /// Duplicate email on registration
    #[error("Email already registered")]
    Conflict,

    /// Invalid or expired verification/reset token
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller lacks the required role
    #[error("Access denied")]
    Forbidden,

    /// Request failed input validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// OAuth provider interaction failed
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Email delivery failed
    #[error("Failed to send email")]
    Email(String),

    /// Unexpected internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::EmailNotVerified => StatusCode::FORBIDDEN,
            Self::AccountLocked => StatusCode::LOCKED,
            Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::TokenMalformed => StatusCode::UNAUTHORIZED,
            Self::BadSignature => StatusCode::UNAUTHORIZED,
            Self::TokenIssuedInFuture => StatusCode::UNAUTHORIZED,
            Self::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            Self::Conflict => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::OAuth(_) => StatusCode::BAD_REQUEST,
            Self::Email(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Unauthenticated => "AUTH_REQUIRED",
            Self::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            Self::AccountLocked => "ACCOUNT_LOCKED",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenMalformed => "TOKEN_MALFORMED",
            Self::BadSignature => "BAD_SIGNATURE",
            Self::TokenIssuedInFuture => "TOKEN_IAT_FUTURE",
            Self::TooManyAttempts => "TOO_MANY_ATTEMPTS",
            Self::Conflict => "EMAIL_CONFLICT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden => "ACCESS_DENIED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::OAuth(_) => "OAUTH_ERROR",
            Self::Email(_) => "EMAIL_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// External message. Internal detail for `Email` and `Internal` is
    /// kept out of the response body.
    fn public_message(&self) -> String {
        match self {
            Self::Email(_) => "Failed to send email".to_string(),
            Self::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "auth error: {}", self);
        } else {
            tracing::debug!(code = self.error_code(), "auth failure: {}", self);
        }
        let body = ErrorResponse {
            error: self.public_message(),
            code: self.error_code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::Conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::TooManyAttempts.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(AuthError::AccountLocked.status_code(), StatusCode::LOCKED);
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let err = AuthError::Internal("db pool exhausted".to_string());
        assert_eq!(err.public_message(), "Internal error");

        let err = AuthError::Email("smtp timeout at 10.0.0.3".to_string());
        assert_eq!(err.public_message(), "Failed to send email");
    }

    #[test]
    fn test_credential_errors_stay_vague() {
        // Same external message regardless of whether the user exists
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid credentials"
        );
    }
}
