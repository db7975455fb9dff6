//! Error handling module for ShareSpace.
//!
//! One taxonomy serves the local store, the HTTP server and the HTTP client:
//! the server renders an error as a code in the response envelope and the
//! client maps that code back to the same variant.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const DUPLICATE_ACCOUNT: &str = "DUPLICATE_ACCOUNT";
    pub const MODERATION_REJECTED: &str = "MODERATION_REJECTED";
    pub const EXTERNAL_AUTH_FAILURE: &str = "EXTERNAL_AUTH_FAILURE";
    pub const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const TRANSIENT_IO_ERROR: &str = "TRANSIENT_IO_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Application error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Empty or malformed input, detected before any I/O
    Validation(String),
    /// Missing or expired token; the session must be cleared
    Unauthorized(String),
    /// Credential login rejected by the authority
    InvalidCredentials,
    /// Signup for an email that already has an account
    DuplicateAccount(String),
    /// Content refused by the supportiveness policy
    ModerationRejected(String),
    /// One-shot external session exchange failed
    ExternalAuthFailure(String),
    /// Embedded image larger than the allowed payload
    PayloadTooLarge(String),
    /// Referenced record does not exist
    NotFound(String),
    /// Network or storage failure; the caller may retry
    Transient(String),
    /// Unexpected failure (corrupt record, hashing failure)
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::DuplicateAccount(_) => StatusCode::CONFLICT,
            AppError::ModerationRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ExternalAuthFailure(_) => StatusCode::UNAUTHORIZED,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::InvalidCredentials => codes::INVALID_CREDENTIALS,
            AppError::DuplicateAccount(_) => codes::DUPLICATE_ACCOUNT,
            AppError::ModerationRejected(_) => codes::MODERATION_REJECTED,
            AppError::ExternalAuthFailure(_) => codes::EXTERNAL_AUTH_FAILURE,
            AppError::PayloadTooLarge(_) => codes::PAYLOAD_TOO_LARGE,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Transient(_) => codes::TRANSIENT_IO_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::InvalidCredentials => "Invalid email or password".to_string(),
            AppError::DuplicateAccount(msg) => msg.clone(),
            AppError::ModerationRejected(msg) => msg.clone(),
            AppError::ExternalAuthFailure(msg) => msg.clone(),
            AppError::PayloadTooLarge(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Transient(msg) => msg.clone(),
            AppError::Internal(msg) => msg.clone(),
        }
    }

    /// Whether this error must tear down the current session.
    pub fn clears_session(&self) -> bool {
        matches!(self, AppError::Unauthorized(_))
    }

    /// Rebuild an error from a wire code and message.
    ///
    /// Unknown codes are treated as transient.
    pub fn from_code(code: &str, message: String) -> Self {
        match code {
            codes::VALIDATION_ERROR => AppError::Validation(message),
            codes::UNAUTHORIZED => AppError::Unauthorized(message),
            codes::INVALID_CREDENTIALS => AppError::InvalidCredentials,
            codes::DUPLICATE_ACCOUNT => AppError::DuplicateAccount(message),
            codes::MODERATION_REJECTED => AppError::ModerationRejected(message),
            codes::EXTERNAL_AUTH_FAILURE => AppError::ExternalAuthFailure(message),
            codes::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge(message),
            codes::NOT_FOUND => AppError::NotFound(message),
            codes::INTERNAL_ERROR => AppError::Internal(message),
            _ => AppError::Transient(message),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Storage error: {:?}", err);
        AppError::Transient(format!("Storage error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::warn!("Network error: {:?}", err);
        AppError::Transient(format!("Network error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::Internal(format!("JSON error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorResponse::new(&self))).into_response()
    }
}
