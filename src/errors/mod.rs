/// Unified error handling module
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Unified error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Errors returned by the HTTP surface.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::CredentialMissing => {
                ApiError::Conflict(PipelineError::CredentialMissing.to_string())
            }
            PipelineError::Storage(e) => ApiError::Storage(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self {
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        };

        let error_response = ErrorResponse {
            ok: false,
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        // Always HTTP 200 with ok=false, the screen client branches on `ok`
        (StatusCode::OK, Json(error_response)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

/// Failures raised inside the fetch-and-present pipeline.
///
/// Every variant is terminal for the operation that raised it. None of them
/// stop later loads from running.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Network, HTTP status or JSON failure on the metadata request.
    #[error("failed to load data: {0}")]
    MetadataFetchFailed(String),

    /// Image bytes could not be fetched or decoded.
    #[error("failed to load media: {0}")]
    MediaFetchFailed(String),

    #[error("unknown media type: {0:?}")]
    UnknownMediaType(String),

    #[error("translation failed: {0}")]
    TranslationFailed(#[from] TranslationError),

    #[error("credential store error: {0}")]
    Storage(#[from] sqlx::Error),

    /// A gesture arrived before the API key was resolved.
    #[error("API key has not been provided yet")]
    CredentialMissing,
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors reported by a translation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslationError {
    #[error("translation model is not ready")]
    ModelNotReady,

    #[error("model download deferred: {0}")]
    DownloadDeferred(String),

    #[error("language pair {from}->{to} is not offered")]
    UnsupportedPair { from: String, to: String },

    #[error("translation request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TranslationError {
    fn from(err: reqwest::Error) -> Self {
        TranslationError::Request(err.to_string())
    }
}
