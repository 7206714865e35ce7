use hyper::StatusCode;
use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for save-proxy request handling
pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Errors that end a request early. Every variant is rendered as a plain-text
/// response; the message is the response body.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Carries the method the endpoint does accept.
    #[error("Only {0} allowed")]
    MethodNotAllowed(&'static str),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    /// The store answered the revision lookup with a non-success status.
    #[error("Remote store GET failed: {0}")]
    UpstreamReadFailure(String),

    /// The store rejected the conditional write, including revision conflicts.
    #[error("Remote store PUT failed: {0}")]
    UpstreamWriteFailure(String),

    #[error("Server error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UpstreamReadFailure(_)
            | ApiError::UpstreamWriteFailure(_)
            | ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn from_read(e: StoreError) -> Self {
        match e {
            StoreError::Rejected { body, .. } => ApiError::UpstreamReadFailure(body),
            other => ApiError::InternalError(other.to_string()),
        }
    }

    pub(crate) fn from_write(e: StoreError) -> Self {
        match e {
            StoreError::Rejected { body, .. } => ApiError::UpstreamWriteFailure(body),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}
