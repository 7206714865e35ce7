use crate::request::FileLocation;
use crate::store::{ContentStore, FileWrite, RemoteFileState, StoreError, WriteOutcome};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::HeaderMap;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    FileState(FileLocation),
    WriteFile(FileLocation, FileWrite),
}

/// How a `FakeStore` call fails.
#[derive(Clone, Debug)]
enum Fault {
    /// The store answered with a non-success status.
    Rejected(StatusCode, String),
    /// The store could not be reached at all.
    Unreachable(String),
}

impl Fault {
    fn to_error(&self) -> StoreError {
        match self {
            Fault::Rejected(status, body) => StoreError::Rejected {
                status: *status,
                body: body.clone(),
            },
            Fault::Unreachable(reason) => StoreError::InvalidBaseUrl(reason.clone()),
        }
    }
}

/// In-memory store that records every call and answers with canned results.
pub struct FakeStore {
    read: Result<String, Fault>,
    write: Result<Option<String>, Fault>,
    calls: Mutex<Vec<StoreCall>>,
}

impl FakeStore {
    pub fn new(revision: &str, new_revision: Option<&str>) -> Self {
        FakeStore {
            read: Ok(revision.to_string()),
            write: Ok(new_revision.map(str::to_string)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_read(mut self, status: StatusCode, body: &str) -> Self {
        self.read = Err(Fault::Rejected(status, body.to_string()));
        self
    }

    pub fn failing_write(mut self, status: StatusCode, body: &str) -> Self {
        self.write = Err(Fault::Rejected(status, body.to_string()));
        self
    }

    /// Reads fail before any response is received, like a transport error.
    pub fn unreachable(mut self, reason: &str) -> Self {
        self.read = Err(Fault::Unreachable(reason.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentStore for FakeStore {
    async fn file_state(&self, location: &FileLocation) -> Result<RemoteFileState, StoreError> {
        self.calls
            .lock()
            .unwrap()
            .push(StoreCall::FileState(location.clone()));

        match &self.read {
            Ok(revision_id) => Ok(RemoteFileState {
                revision_id: revision_id.clone(),
            }),
            Err(fault) => Err(fault.to_error()),
        }
    }

    async fn write_file(
        &self,
        location: &FileLocation,
        write: &FileWrite,
    ) -> Result<WriteOutcome, StoreError> {
        self.calls
            .lock()
            .unwrap()
            .push(StoreCall::WriteFile(location.clone(), write.clone()));

        match &self.write {
            Ok(new_revision_id) => Ok(WriteOutcome {
                new_revision_id: new_revision_id.clone(),
            }),
            Err(fault) => Err(fault.to_error()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Local HTTP server standing in for the remote store. Each request is
/// recorded before the responder's answer is sent back.
pub struct MockStoreServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockStoreServer {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (StatusCode, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let addr = listener.local_addr().unwrap();

        let requests = Arc::new(Mutex::new(Vec::new()));
        let responder = Arc::new(responder);
        let recorded = requests.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);
                let recorded = recorded.clone();
                let responder = responder.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let recorded = recorded.clone();
                        let responder = responder.clone();
                        async move {
                            let (parts, body) = req.into_parts();
                            let body = body
                                .collect()
                                .await
                                .map(|collected| collected.to_bytes())
                                .unwrap_or_default();
                            let request = RecordedRequest {
                                method: parts.method,
                                uri: parts.uri,
                                headers: parts.headers,
                                body,
                            };

                            let (status, payload) = responder(&request);
                            recorded.lock().unwrap().push(request);

                            let mut response = Response::new(Full::new(Bytes::from(payload)));
                            *response.status_mut() = status;
                            Ok::<_, Infallible>(response)
                        }
                    });

                    if let Err(err) = Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await
                    {
                        eprintln!("Error serving connection: {:?}", err);
                    }
                });
            }
        });

        MockStoreServer { addr, requests }
    }

    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).expect("Failed to parse URL")
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}
