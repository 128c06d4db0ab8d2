//! API Error Types
//!
//! Errors raised while talking to the REST backend, and their conversion
//! into transient user notices.

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Base URL missing or similar; fatal
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Session missing, expired or not allowed (401/403)
    #[error("Not authorized ({0})")]
    Unauthorized(u16),

    /// Backend unreachable
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// Backend answered with an error status
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body was not what we expected
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map a transport-level `reqwest` failure
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_connect() || e.is_request() {
            ApiError::Network(e.to_string())
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }

    /// Whether the caller should send the user back to the login screen
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// User-facing notice for this error
    pub fn notice(&self) -> Notice {
        match self {
            ApiError::Config(_) => Notice::error("Console is not configured: missing backend URL"),
            ApiError::Unauthorized(_) => Notice::warning("Your session has expired. Please sign in again."),
            ApiError::Network(_) | ApiError::Timeout => Notice::error("Cannot connect to backend"),
            ApiError::Status { status, message } if *status >= 500 => {
                Notice::error(format!("Server error ({}): {}", status, message))
            }
            ApiError::Status { message, .. } => Notice::warning(message.clone()),
            ApiError::Decode(_) => Notice::error("Unexpected response from backend"),
        }
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// A transient notification for the user (a toast)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}
