use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, HeaderMap, HeaderValue, VARY,
};

use crate::config::{CorsConfig, ValidationError};

const ALLOW_METHODS: &str = "OPTIONS, POST";
const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-API-Key";

/// CORS headers attached to every response from the public listener,
/// including preflights and errors.
#[derive(Clone, Debug)]
pub struct CorsPolicy {
    allow_origin: HeaderValue,
    max_age: HeaderValue,
}

impl CorsPolicy {
    pub fn try_new(config: &CorsConfig) -> Result<Self, ValidationError> {
        let allow_origin = HeaderValue::from_str(&config.allow_origin)
            .map_err(|_| ValidationError::InvalidHeaderValue("cors.allow_origin"))?;

        Ok(Self {
            allow_origin,
            max_age: HeaderValue::from(config.max_age_secs),
        })
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(VARY, HeaderValue::from_static("Origin"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
    }
}
