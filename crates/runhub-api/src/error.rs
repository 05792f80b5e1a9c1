//! Error types for the runhub API.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use runhub_core::{BackendError, JobError, ValidationError};
use runhub_protocol::ErrorBody;
use thiserror::Error;

/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors that can occur in the runhub API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The job request was rejected
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The backend could not run the job
    #[error("{0}")]
    Backend(#[from] BackendError),

    /// The body could not be read as JSON
    #[error("{0}")]
    InvalidRequest(String),

    #[error("requests must be of type application/json")]
    UnsupportedMediaType,

    /// Server configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Create a new configuration error.
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation(_) | ApiError::Backend(_) | ApiError::InvalidRequest(_) => 400,
            ApiError::UnsupportedMediaType => 415,
            ApiError::Config(_) | ApiError::Internal(_) => 500,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Backend(_) => "backend_error",
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::UnsupportedMediaType => "unsupported_media_type",
            ApiError::Config(_) => "config_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Validation(e) => ApiError::Validation(e),
            JobError::Backend(e) => ApiError::Backend(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => ApiError::UnsupportedMediaType,
            other => ApiError::InvalidRequest(other.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_and_backend_faults_look_alike_to_clients() {
        let validation = ApiError::from(JobError::from(ValidationError::new("bad")));
        let backend = ApiError::from(JobError::from(BackendError::prime("no slot")));
        assert_eq!(validation.status_code(), 400);
        assert_eq!(backend.status_code(), 400);
        assert_eq!(validation.to_string(), "bad");
        assert_ne!(validation.error_type(), backend.error_type());
    }

    #[test]
    fn test_unsupported_media_type() {
        let err = ApiError::UnsupportedMediaType;
        assert_eq!(err.status_code(), 415);
        assert_eq!(err.to_string(), "requests must be of type application/json");
    }
}
