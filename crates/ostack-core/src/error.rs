//! Error types for OpenStack operations.
//!
//! This module provides the error type shared by every service client,
//! including the mapping from HTTP failures onto a small, stable taxonomy.

use thiserror::Error;

/// Main error type for OpenStack operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Service is unavailable or returned a transient failure
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Credentials were rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// No endpoint for the requested service in the catalog
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    /// Failed to parse a service response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Invalid UUID format
    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),

    /// Invalid network or subnet definition
    #[error("Invalid network configuration: {0}")]
    InvalidNetwork(String),

    /// Server reached an unexpected state
    #[error("Invalid server state: {0}")]
    InvalidServerState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Operation timed out
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request with details
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Quota exceeded
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Conflict error
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Specialized result type for OpenStack operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            Self::EndpointNotFound(_) => "ENDPOINT_NOT_FOUND",
            Self::ParseError(_) => "PARSE_ERROR",
            Self::InvalidUuid(_) => "INVALID_UUID",
            Self::InvalidNetwork(_) => "INVALID_NETWORK",
            Self::InvalidServerState(_) => "INVALID_SERVER_STATE",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
        }
    }

    /// Returns true if repeating the request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_) | Self::Timeout(_))
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Self::InvalidUuid(err.to_string())
    }
}
