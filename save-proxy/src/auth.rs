use hyper::header::{AUTHORIZATION, HeaderMap, HeaderName};

use crate::errors::ApiError;

pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

const BEARER_PREFIX: &str = "Bearer ";

/// Checks the caller's shared key before anything else touches the request.
#[derive(Clone)]
pub struct AuthGate {
    shared_key: String,
}

impl AuthGate {
    pub fn new(shared_key: impl Into<String>) -> Self {
        Self {
            shared_key: shared_key.into(),
        }
    }

    /// An empty configured key rejects everything, since a presented
    /// credential is never empty.
    pub fn check(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        match presented_credential(headers) {
            Some(key) if key == self.shared_key => Ok(()),
            _ => Err(ApiError::Unauthorized),
        }
    }
}

/// Returns the trimmed, non-empty credential from `X-API-Key`, falling back to
/// a `Bearer` token in `Authorization`.
pub fn presented_credential(headers: &HeaderMap) -> Option<&str> {
    let header_str = |name: &HeaderName| headers.get(name).and_then(|v| v.to_str().ok());

    header_str(&API_KEY_HEADER)
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .or_else(|| {
            header_str(&AUTHORIZATION)
                .and_then(|value| value.strip_prefix(BEARER_PREFIX))
                .map(str::trim)
                .filter(|key| !key.is_empty())
        })
}
