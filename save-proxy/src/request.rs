use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::LocationDefaults;
use crate::errors::ApiError;

/// Body of a save request. `json`, `message` and `repo` are accepted as
/// aliases so older front-ends keep working.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    #[serde(default)]
    pub content: Option<Value>,
    /// Legacy name for `content`, read only when `content` is missing.
    #[serde(default)]
    pub json: Option<Value>,
    #[serde(default, alias = "message")]
    pub commit_message: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default, alias = "repo")]
    pub repository: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

/// Where a file lives in the remote store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileLocation {
    pub owner: String,
    pub repository: String,
    pub path: String,
    pub branch: String,
}

/// A request that passed body validation, with every default applied.
#[derive(Debug, PartialEq)]
pub struct ValidatedUpdate {
    pub location: FileLocation,
    pub content: Value,
    pub commit_message: String,
}

/// Returned to the caller as `{"ok": true, "commit": ...}`.
#[derive(Debug, PartialEq, Eq)]
pub struct UpdateResult {
    pub committed: bool,
    pub new_revision_id: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct SaveResponse<'a> {
    pub ok: bool,
    pub commit: Option<&'a str>,
}

impl<'a> From<&'a UpdateResult> for SaveResponse<'a> {
    fn from(result: &'a UpdateResult) -> Self {
        SaveResponse {
            ok: result.committed,
            commit: result.new_revision_id.as_deref(),
        }
    }
}

impl UpdateRequest {
    pub fn from_slice(body: &[u8]) -> Result<Self, ApiError> {
        serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
    }

    /// Missing, null and empty-string content are all rejected, as is any
    /// location that would not map onto exactly one file in the store.
    pub fn validate(self, defaults: &LocationDefaults) -> Result<ValidatedUpdate, ApiError> {
        let content = present_content(self.content)
            .or_else(|| present_content(self.json))
            .ok_or_else(|| ApiError::BadRequest("include { content }".into()))?;

        let non_empty = |value: Option<String>, default: &str| {
            value
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let location = FileLocation {
            owner: non_empty(self.owner, &defaults.owner),
            repository: non_empty(self.repository, &defaults.repository),
            path: non_empty(self.path, &defaults.path),
            branch: non_empty(self.branch, &defaults.branch),
        };

        location.check()?;

        let commit_message = self
            .commit_message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_commit_message(&location.path));

        Ok(ValidatedUpdate {
            location,
            content,
            commit_message,
        })
    }
}

impl FileLocation {
    /// Owner and repository are single URL segments and every path segment
    /// must name a real directory entry. `.` and `..` would otherwise be
    /// collapsed when the store URL is built.
    fn check(&self) -> Result<(), ApiError> {
        for (field, value) in [("owner", &self.owner), ("repository", &self.repository)] {
            if value.contains('/') || is_dot_segment(value) {
                return Err(ApiError::BadRequest(format!("invalid {field}: {value}")));
            }
        }

        if self
            .path
            .split('/')
            .any(|segment| segment.is_empty() || is_dot_segment(segment))
        {
            return Err(ApiError::BadRequest(format!("invalid path: {}", self.path)));
        }

        Ok(())
    }
}

fn is_dot_segment(segment: &str) -> bool {
    segment == "." || segment == ".."
}

fn present_content(content: Option<Value>) -> Option<Value> {
    match content {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(content) => Some(content),
    }
}

pub fn default_commit_message(path: &str) -> String {
    format!("Update {path} via directory admin")
}
