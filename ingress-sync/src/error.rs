//! Error types for ingress-sync.

use thiserror::Error;

use ingress_core::EntityId;

/// Failures fetching or decoding a change batch. Any of these aborts the
/// cycle and leaves the cursor where it was.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider unreachable, timed out, or the body could not be read.
    #[error("provider transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status.
    #[error("provider returned status {code}: {body}")]
    Status { code: u16, body: String },

    /// The provider answered but refused the query.
    #[error("provider rejected query: {0}")]
    Rejected(String),

    /// The response envelope did not have the expected shape.
    #[error("malformed provider response: {0}")]
    Envelope(String),
}

/// Failures reported by the entity store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Merge target does not exist. Not a failure for upserts: it triggers
    /// the create fallback.
    #[error("entity {0} not found")]
    NotFound(EntityId),

    #[error("entity {0} already exists")]
    AlreadyExists(EntityId),

    #[error("store transport error: {0}")]
    Transport(String),

    #[error("store returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("failed to encode entity: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// A single entity could not be written. Record-local.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Merge failed for a reason other than "not found"; create was not tried.
    #[error("merge of {id} failed: {source}")]
    Merge {
        id: EntityId,
        #[source]
        source: StoreError,
    },

    /// Merge reported "not found" and the create fallback failed too.
    #[error("create of {id} failed: {source}")]
    Create {
        id: EntityId,
        #[source]
        source: StoreError,
    },
}

/// Whole-cycle failures, the only errors that leave `run_cycle`.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to fetch changes: {0}")]
    Provider(#[from] ProviderError),
}
