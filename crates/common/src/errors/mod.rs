//! Error types for FollowRank services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::nostr::CodecError;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    InvalidIdentifier,

    // Conflict errors (5xxx)
    RunInProgress,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External service errors (8xxx)
    RelayError,
    RelayTimeout,
    InvalidEvent,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::InvalidIdentifier => 1002,

            // Conflicts (5xxx)
            ErrorCode::RunInProgress => 5001,

            // Database (7xxx)
            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            // External (8xxx)
            ErrorCode::RelayError => 8001,
            ErrorCode::RelayTimeout => 8002,
            ErrorCode::InvalidEvent => 8003,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Invalid identifier: {0}")]
    Codec(#[from] CodecError),

    // Conflict errors
    #[error("{job} run {run_id} is already in progress")]
    RunInProgress { job: String, run_id: u64 },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // Relay errors
    #[error("Relay error ({relay}): {message}")]
    Relay { relay: String, message: String },

    #[error("Relay timeout after {timeout_ms}ms")]
    RelayTimeout { timeout_ms: u64 },

    #[error("Invalid event: {message}")]
    InvalidEvent { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Codec(_) => ErrorCode::InvalidIdentifier,
            AppError::RunInProgress { .. } => ErrorCode::RunInProgress,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Relay { .. } => ErrorCode::RelayError,
            AppError::RelayTimeout { .. } => ErrorCode::RelayTimeout,
            AppError::InvalidEvent { .. } => ErrorCode::InvalidEvent,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Codec(_) => StatusCode::BAD_REQUEST,

            // 409 Conflict
            AppError::RunInProgress { .. } => StatusCode::CONFLICT,

            // 500 Internal Server Error
            AppError::Database(_) |
            AppError::DatabaseConnection { .. } |
            AppError::Internal { .. } |
            AppError::Configuration { .. } |
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Relay { .. } |
            AppError::InvalidEvent { .. } => StatusCode::BAD_GATEWAY,

            // 504 Gateway Timeout
            AppError::RelayTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Relay-side failures that a caller may swallow and treat as "no data"
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Relay { .. } | AppError::RelayTimeout { .. } | AppError::InvalidEvent { .. }
        )
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub numeric_code: u16,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                numeric_code: code.as_code(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}
