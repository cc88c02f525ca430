//! Store-level error types.

use thiserror::Error;

/// Errors surfaced by the blog data store.
///
/// `Validation`, `NotFound` and `Conflict` are recoverable at the calling
/// layer (re-prompt, "not found" page, duplicate-name message). `Database`
/// covers backend failures the caller cannot act on beyond reporting.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{field} must not be blank")]
    Validation { field: &'static str },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i32) -> Self {
        Self::NotFound { entity, id }
    }
}

/// Result alias used by every store operation.
pub type StoreResult<T> = Result<T, StoreError>;
