use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Structured error type shared by the transcript pipeline and the HTTP layer
#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error codes for categorizing different error types
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // File errors
    FileNotFound,
    FileReadError,

    // Transcript errors
    ParseError,

    // Validation errors
    InvalidParams,

    // Lookup errors
    SessionNotFound,

    // Config errors
    ConfigError,

    // Generic
    Unknown,
}

/// Message returned to clients for any failure while loading a transcript.
/// Filesystem and parser details stay in the server log.
pub const SESSION_FILE_ERROR: &str = "Failed to read session file";

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(details) = &self.details {
            write!(f, "{:?}: {} - {}", self.code, self.message, details)
        } else {
            write!(f, "{:?}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for AppError {}

// Convenience constructors
impl AppError {
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::FileNotFound,
            message: "File not found".to_string(),
            details: Some(path.into()),
        }
    }

    pub fn file_read(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::FileReadError,
            message: "Failed to read file".to_string(),
            details: Some(msg.into()),
        }
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ParseError,
            message: "Failed to parse transcript".to_string(),
            details: Some(msg.into()),
        }
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidParams,
            message: msg.into(),
            details: None,
        }
    }

    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::SessionNotFound,
            message: "Session not found".to_string(),
            details: Some(session_id.into()),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ConfigError,
            message: "Invalid configuration".to_string(),
            details: Some(msg.into()),
        }
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Unknown,
            message: msg.into(),
            details: None,
        }
    }

    /// HTTP status for this error at the route boundary
    pub fn status(&self) -> StatusCode {
        match self.code {
            ErrorCode::SessionNotFound => StatusCode::NOT_FOUND,
            ErrorCode::InvalidParams => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Conversions from common error types
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => Self::file_not_found(err.to_string()),
            _ => Self::file_read(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse_error(format!("JSON parse error: {}", err))
    }
}

/// Error body sent to HTTP clients
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self.code {
            ErrorCode::SessionNotFound => self.message.clone(),
            ErrorCode::InvalidParams => self.message.clone(),
            _ => {
                tracing::error!(error = %self, "request failed");
                SESSION_FILE_ERROR.to_string()
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_file_not_found() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.code, ErrorCode::FileNotFound);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::session_not_found("abc").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::invalid_params("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::parse_error("eof").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::SessionNotFound).unwrap();
        assert_eq!(json, "\"SESSION_NOT_FOUND\"");
    }
}
