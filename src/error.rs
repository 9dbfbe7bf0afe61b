//! Error types for the drive_service crate.

use thiserror::Error;

/// Errors that can occur when interacting with Google Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),
}

impl DriveError {
    /// Build an `ApiError` from a failed response body.
    ///
    /// Google wraps errors as `{"error": {"code": .., "message": ..}}`; anything
    /// else is kept verbatim.
    pub fn from_api_body(status: u16, body: String) -> Self {
        match serde_json::from_str::<crate::models::ApiErrorResponse>(&body) {
            Ok(api_error) => DriveError::ApiError {
                status: api_error.error.code,
                message: api_error.error.message,
            },
            Err(_) => DriveError::ApiError {
                status,
                message: body,
            },
        }
    }
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
