/// Unified error types for the sitetrack service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum SiteError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The owning task does not exist
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Upload is not an accepted image type
    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    /// Upload carried zero bytes
    #[error("Empty file")]
    EmptyFile,

    /// Upload exceeds the pre-compression ceiling
    #[error("File too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: usize, limit: usize },

    /// Every configured blob backend failed
    #[error("All storage backends failed: {0}")]
    StorageUnavailable(String),

    /// A single blob backend call failed
    #[error("Blob storage error: {0}")]
    BlobStorage(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structured error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub code: String,
}

/// Convert SiteError to HTTP response
impl IntoResponse for SiteError {
    fn into_response(self) -> Response {
        let (status, error, code, message) = match &self {
            SiteError::TaskNotFound(_) => (
                StatusCode::NOT_FOUND,
                "Task not found",
                "TASK_NOT_FOUND",
                self.to_string(),
            ),
            SiteError::InvalidFileType(_) => (
                StatusCode::BAD_REQUEST,
                "Invalid file type",
                "INVALID_FILE_TYPE",
                self.to_string(),
            ),
            SiteError::EmptyFile => (
                StatusCode::BAD_REQUEST,
                "Empty file",
                "EMPTY_FILE",
                self.to_string(),
            ),
            SiteError::FileTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "File too large",
                "FILE_TOO_LARGE",
                self.to_string(),
            ),
            SiteError::StorageUnavailable(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Storage unavailable",
                "STORAGE_UNAVAILABLE",
                self.to_string(),
            ),
            SiteError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "Invalid request",
                "INVALID_REQUEST",
                self.to_string(),
            ),
            SiteError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "Not found",
                "NOT_FOUND",
                self.to_string(),
            ),
            SiteError::Database(_)
            | SiteError::Internal(_)
            | SiteError::Io(_)
            | SiteError::BlobStorage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "INTERNAL_ERROR",
                // Don't leak details
                "Internal server error".to_string(),
            ),
        };

        let body = Json(ErrorBody {
            error: error.to_string(),
            message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type SiteResult<T> = Result<T, SiteError>;
