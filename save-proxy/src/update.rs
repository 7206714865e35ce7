use std::sync::Arc;

use crate::encode::encode_content;
use crate::errors::ApiError;
use crate::metrics_defs::UPSTREAM_FAILURES;
use crate::request::{UpdateResult, ValidatedUpdate};
use crate::store::{ContentStore, FileWrite};

/// Read-then-write against the store. The write carries the revision the
/// read returned, so the store rejects it if the file moved in between.
/// Nothing is retried and nothing is kept between calls.
#[derive(Clone)]
pub struct ConditionalUpdate {
    store: Arc<dyn ContentStore>,
}

impl ConditionalUpdate {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub async fn run(&self, update: ValidatedUpdate) -> Result<UpdateResult, ApiError> {
        let ValidatedUpdate {
            location,
            content,
            commit_message,
        } = update;

        let current = self.store.file_state(&location).await.map_err(|e| {
            tracing::warn!(
                owner = %location.owner,
                repository = %location.repository,
                path = %location.path,
                branch = %location.branch,
                error = %e,
                "revision lookup failed"
            );
            shared::counter!(UPSTREAM_FAILURES, "op" => "read").increment(1);
            ApiError::from_read(e)
        })?;

        let encoded = encode_content(&content)
            .map_err(|e| ApiError::InternalError(format!("could not serialize content: {e}")))?;

        let write = FileWrite {
            message: commit_message,
            content: encoded,
            revision_id: current.revision_id,
        };

        let outcome = self.store.write_file(&location, &write).await.map_err(|e| {
            tracing::warn!(
                path = %location.path,
                branch = %location.branch,
                revision = %write.revision_id,
                error = %e,
                "conditional write failed"
            );
            shared::counter!(UPSTREAM_FAILURES, "op" => "write").increment(1);
            ApiError::from_write(e)
        })?;

        tracing::info!(
            path = %location.path,
            branch = %location.branch,
            previous = %write.revision_id,
            commit = outcome.new_revision_id.as_deref().unwrap_or("<none>"),
            "file updated"
        );

        Ok(UpdateResult {
            committed: true,
            new_revision_id: outcome.new_revision_id,
        })
    }
}
