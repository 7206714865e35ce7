use async_trait::async_trait;
use hyper::StatusCode;
use hyper::header::ACCEPT;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::StoreConfig;
use crate::request::FileLocation;

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The store answered with a non-success status. `body` is its raw text.
    #[error("remote store returned {status}: {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("store base URL cannot be used as a base: {0}")]
    InvalidBaseUrl(String),
}

/// Current state of a file as reported by the store.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RemoteFileState {
    #[serde(rename = "sha")]
    pub revision_id: String,
}

/// A conditional write: accepted only while the file is still at `revision_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileWrite {
    pub message: String,
    /// Base64-encoded file bytes
    pub content: String,
    pub revision_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOutcome {
    pub new_revision_id: Option<String>,
}

/// The two operations the save endpoint needs from a content store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn file_state(&self, location: &FileLocation) -> Result<RemoteFileState, StoreError>;

    async fn write_file(
        &self,
        location: &FileLocation,
        write: &FileWrite,
    ) -> Result<WriteOutcome, StoreError>;
}

#[derive(Serialize)]
struct PutContentsBody<'a> {
    message: &'a str,
    content: &'a str,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Deserialize)]
struct PutContentsResponse {
    commit: Option<CommitRef>,
}

#[derive(Deserialize)]
struct CommitRef {
    sha: Option<String>,
}

/// Client for the GitHub repository contents API.
#[derive(Clone)]
pub struct GithubStore {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl GithubStore {
    pub fn new(config: &StoreConfig, token: String) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Self::from_client(client, config.base_url.clone(), token)
    }

    pub fn from_client(
        client: reqwest::Client,
        base_url: Url,
        token: String,
    ) -> Result<Self, StoreError> {
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(GithubStore {
            client,
            base_url,
            token,
        })
    }

    /// `{base}/repos/{owner}/{repo}/contents/{path}`, each segment percent-encoded.
    fn contents_url(&self, location: &FileLocation) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::InvalidBaseUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().extend([
                "repos",
                location.owner.as_str(),
                location.repository.as_str(),
                "contents",
            ]);
            segments.extend(location.path.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    async fn rejected(response: reqwest::Response) -> StoreError {
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => format!("<unreadable response body: {e}>"),
        };
        StoreError::Rejected { status, body }
    }
}

#[async_trait]
impl ContentStore for GithubStore {
    async fn file_state(&self, location: &FileLocation) -> Result<RemoteFileState, StoreError> {
        let url = self.contents_url(location)?;
        let response = self
            .client
            .get(url)
            .query(&[("ref", location.branch.as_str())])
            .bearer_auth(&self.token)
            .header(ACCEPT, GITHUB_MEDIA_TYPE)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }
        Ok(response.json::<RemoteFileState>().await?)
    }

    async fn write_file(
        &self,
        location: &FileLocation,
        write: &FileWrite,
    ) -> Result<WriteOutcome, StoreError> {
        let url = self.contents_url(location)?;
        let body = PutContentsBody {
            message: &write.message,
            content: &write.content,
            sha: &write.revision_id,
            branch: &location.branch,
        };
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .header(ACCEPT, GITHUB_MEDIA_TYPE)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }
        let out = response.json::<PutContentsResponse>().await?;
        Ok(WriteOutcome {
            new_revision_id: out.commit.and_then(|commit| commit.sha),
        })
    }
}
