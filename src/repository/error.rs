use thiserror::Error;

use crate::models::{AlbumValidationError, EntityKind};
use crate::store::StoreError;

/// Errors surfaced by [`super::Repository`].
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A kind name did not match any entity kind. Raised before any
    /// mutation.
    #[error("Unrecognized entity kind: {0}")]
    UnrecognizedKind(String),

    /// No record with this identifier after reconciliation.
    #[error("{kind} with id={id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    /// Caller-supplied data failed validation.
    #[error("Invalid input: {0}")]
    Invalid(#[from] AlbumValidationError),

    /// Every identifier above the current maximum is past `i64::MAX`, so
    /// no fresh album id can be handed out.
    #[error("Album id space exhausted: the largest album id is already {}", i64::MAX)]
    IdSpaceExhausted,

    /// The cancellation token was already cancelled when the call started.
    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl RepositoryError {
    /// Outer layers map this to a 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
