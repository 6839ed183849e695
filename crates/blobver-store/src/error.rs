use std::fmt;

use crate::types::WriteCondition;

/// Why a conditional operation was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictKind {
    /// A create-only write found an existing object (HTTP 409 class).
    AlreadyExists,
    /// The object's current ETag differs from the expected one, or the
    /// object is missing when one was expected (HTTP 412 class).
    ETagMismatch,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::AlreadyExists => f.write_str("object already exists"),
            ConflictKind::ETagMismatch => f.write_str("etag mismatch"),
        }
    }
}

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The container does not exist.
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// An object required by the operation does not exist.
    #[error("blob not found: {container}/{path}")]
    NotFound { container: String, path: String },

    /// A write or copy precondition was not met.
    #[error("{kind} on {container}/{path} (condition: {condition})")]
    Conflict {
        container: String,
        path: String,
        condition: WriteCondition,
        kind: ConflictKind,
    },

    /// The container name or blob path cannot be stored by this backend.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The copy handle was not issued by this store.
    #[error("unknown copy operation: {0}")]
    UnknownCopy(String),

    /// Stored properties could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-internal failure (poisoned lock, join failure).
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns `true` for precondition failures.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Returns `true` if a container or object was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound { .. } | StoreError::ContainerNotFound(_)
        )
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
