use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use shared::http::full_body;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use crate::SaveProxyError;
use crate::auth::AuthGate;
use crate::config::{Config, LocationDefaults, Secrets, ValidationError};
use crate::cors::CorsPolicy;
use crate::errors::{ApiError, Result};
use crate::health::HealthReport;
use crate::metrics_defs::{AUTH_REJECTED, REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::request::{SaveResponse, UpdateRequest};
use crate::store::ContentStore;
use crate::update::ConditionalUpdate;

pub type ResponseBody = BoxBody<Bytes, SaveProxyError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Endpoint {
    Health,
    Save,
}

impl Endpoint {
    fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Health => "health",
            Endpoint::Save => "save",
        }
    }
}

/// Public listener: the health probe on its configured path, the save
/// endpoint everywhere else.
#[derive(Clone)]
pub struct SaveService {
    inner: Arc<SaveServiceInner>,
}

struct SaveServiceInner {
    auth: AuthGate,
    cors: CorsPolicy,
    update: ConditionalUpdate,
    defaults: LocationDefaults,
    health_path: String,
    health: HealthReport,
}

impl SaveService {
    pub fn new(
        config: &Config,
        secrets: &Secrets,
        store: Arc<dyn ContentStore>,
    ) -> std::result::Result<Self, ValidationError> {
        let inner = SaveServiceInner {
            auth: AuthGate::new(secrets.client_shared_key.clone()),
            cors: CorsPolicy::try_new(&config.cors)?,
            update: ConditionalUpdate::new(store),
            defaults: config.defaults.clone(),
            health_path: config.health_path.clone(),
            health: HealthReport::from_secrets(secrets),
        };
        Ok(SaveService {
            inner: Arc::new(inner),
        })
    }

    /// Handles one request end to end. Never fails: every error becomes a
    /// response, and every response carries the CORS headers.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body,
        B::Error: Display,
    {
        self.inner.handle(req).await
    }
}

impl SaveServiceInner {
    async fn handle<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body,
        B::Error: Display,
    {
        let started = Instant::now();
        shared::gauge!(REQUESTS_INFLIGHT).increment(1.0);

        let endpoint = match req.uri().path() == self.health_path {
            true => Endpoint::Health,
            false => Endpoint::Save,
        };
        tracing::debug!(
            method = %req.method(),
            path = req.uri().path(),
            endpoint = endpoint.as_str(),
            "request received"
        );

        let result = match endpoint {
            Endpoint::Health => self.health(req.method()),
            Endpoint::Save => self.save(req).await,
        };
        let mut response = result.unwrap_or_else(|e| error_response(&e));
        self.cors.apply(response.headers_mut());

        shared::gauge!(REQUESTS_INFLIGHT).decrement(1.0);
        shared::histogram!(
            REQUEST_DURATION,
            "status" => response.status().as_str().to_string(),
            "endpoint" => endpoint.as_str(),
        )
        .record(started.elapsed().as_secs_f64());

        response
    }

    fn health(&self, method: &Method) -> Result<Response<ResponseBody>> {
        match *method {
            Method::OPTIONS => Ok(empty_response(StatusCode::NO_CONTENT)),
            Method::GET => json_response(&self.health),
            _ => Err(ApiError::MethodNotAllowed("GET")),
        }
    }

    async fn save<B>(&self, req: Request<B>) -> Result<Response<ResponseBody>>
    where
        B: Body,
        B::Error: Display,
    {
        match *req.method() {
            Method::OPTIONS => return Ok(empty_response(StatusCode::NO_CONTENT)),
            Method::POST => {}
            _ => return Err(ApiError::MethodNotAllowed("POST")),
        }

        // Must run before the body is read or the store is contacted.
        if let Err(e) = self.auth.check(req.headers()) {
            tracing::warn!("rejected save request without a valid shared key");
            shared::counter!(AUTH_REJECTED).increment(1);
            return Err(e);
        }

        let body = req
            .into_body()
            .collect()
            .await
            .map_err(|e| ApiError::InternalError(format!("failed to read request body: {e}")))?
            .to_bytes();

        let update = UpdateRequest::from_slice(&body)?.validate(&self.defaults)?;
        let result = self.update.run(update).await?;

        json_response(&SaveResponse::from(&result))
    }
}

impl Service<Request<Incoming>> for SaveService {
    type Response = Response<ResponseBody>;
    type Error = SaveProxyError;
    type Future =
        Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.handle(req).await) })
    }
}

fn empty_response(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(full_body(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn error_response(e: &ApiError) -> Response<ResponseBody> {
    let mut response = Response::new(full_body(e.to_string()));
    *response.status_mut() = e.status();
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn json_response<T: Serialize>(value: &T) -> Result<Response<ResponseBody>> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| ApiError::InternalError(format!("could not serialize response: {e}")))?;
    let mut response = Response::new(full_body(bytes));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}
