use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gallery_core::{ErrorBody, FileFailure};
use thiserror::Error;
use tracing::error;

/// Errors returned by HTTP handlers.
///
/// Every failure is translated into one of these before it reaches the
/// client; internal causes are logged and never echoed back.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Failed to upload any files")]
    UploadFailed(Vec<FileFailure>),

    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// An unclassified failure; `message` is what the client sees
    pub fn internal(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UploadFailed(_) | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Internal { message, source } => {
                error!(error = %format!("{source:#}"), "{message}");
                ErrorBody::new(message)
            }
            ApiError::UploadFailed(failures) => {
                error!(failed = failures.len(), "Failed to upload any files");
                ErrorBody {
                    error: "Failed to upload any files".to_string(),
                    failures,
                }
            }
            other => ErrorBody::new(other.to_string()),
        };

        (status, Json(body)).into_response()
    }
}
