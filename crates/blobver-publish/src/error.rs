use std::fmt;
use std::time::Duration;

use blobver_store::{ConflictKind, StoreError, WriteCondition};

use crate::outcome::PublishOutcome;

/// Which of the objects touched by a publish an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectRole {
    Direct,
    Latest,
    Marker,
}

impl fmt::Display for ObjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRole::Direct => f.write_str("direct"),
            ObjectRole::Latest => f.write_str("latest"),
            ObjectRole::Marker => f.write_str("latest-number marker"),
        }
    }
}

/// Errors from publishing and reading versioned objects.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// An optimistic-concurrency condition failed. Re-read and retry.
    #[error("conflict on {role} object '{path}': {kind} (condition: {condition})")]
    Conflict {
        role: ObjectRole,
        path: String,
        condition: WriteCondition,
        kind: ConflictKind,
    },

    /// An object the protocol had just written or relied on is missing.
    #[error("{role} object not found: {path}")]
    NotFound { role: ObjectRole, path: String },

    #[error("copy of '{from}' to '{to}' still pending after {deadline:?}")]
    TimedOut {
        from: String,
        to: String,
        deadline: Duration,
    },

    #[error("copy of '{from}' to '{to}' failed: {reason}")]
    CopyFailed {
        from: String,
        to: String,
        reason: String,
    },

    #[error("marker '{path}' holds an unreadable number: {value:?}")]
    InvalidMarker { path: String, value: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The direct object was written but a later step failed.
    #[error("publish incomplete after writing the direct object: {source}")]
    Partial {
        outcome: Box<PublishOutcome>,
        source: Box<PublishError>,
    },
}

impl PublishError {
    /// Map a store error raised while operating on the object playing `role`.
    pub(crate) fn at(role: ObjectRole, err: StoreError) -> Self {
        match err {
            StoreError::Conflict {
                path,
                condition,
                kind,
                ..
            } => PublishError::Conflict {
                role,
                path,
                condition,
                kind,
            },
            StoreError::NotFound { path, .. } => PublishError::NotFound { role, path },
            other => PublishError::Store(other),
        }
    }

    pub(crate) fn partial(self, outcome: &PublishOutcome) -> Self {
        PublishError::Partial {
            outcome: Box::new(outcome.clone()),
            source: Box::new(self),
        }
    }

    /// Returns `true` if an optimistic-concurrency condition failed.
    pub fn is_conflict(&self) -> bool {
        match self {
            PublishError::Conflict { .. } => true,
            PublishError::Store(err) => err.is_conflict(),
            PublishError::Partial { source, .. } => source.is_conflict(),
            _ => false,
        }
    }

    /// Returns `true` if a required object was missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            PublishError::NotFound { .. } => true,
            PublishError::Store(err) => err.is_not_found(),
            PublishError::Partial { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// The kind of the failed condition, if this is a conflict.
    pub fn conflict_kind(&self) -> Option<ConflictKind> {
        match self {
            PublishError::Conflict { kind, .. } => Some(*kind),
            PublishError::Store(StoreError::Conflict { kind, .. }) => Some(*kind),
            PublishError::Partial { source, .. } => source.conflict_kind(),
            _ => None,
        }
    }

    /// What had been written before the failure, if anything.
    pub fn partial_outcome(&self) -> Option<&PublishOutcome> {
        match self {
            PublishError::Partial { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

pub type PublishResult<T> = Result<T, PublishError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflict_takes_role() {
        let err = PublishError::at(
            ObjectRole::Latest,
            StoreError::Conflict {
                container: "c".into(),
                path: "p/latest.txt".into(),
                condition: WriteCondition::IfNotExists,
                kind: ConflictKind::AlreadyExists,
            },
        );
        assert!(err.is_conflict());
        assert_eq!(err.conflict_kind(), Some(ConflictKind::AlreadyExists));
        assert!(err.to_string().contains("latest object 'p/latest.txt'"));
    }

    #[test]
    fn partial_delegates_to_source() {
        let outcome = PublishOutcome {
            direct_uri: Some("memory://c/p/1.txt".into()),
            ..Default::default()
        };
        let err = PublishError::NotFound {
            role: ObjectRole::Direct,
            path: "p/1.txt".into(),
        }
        .partial(&outcome);
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
        assert_eq!(
            err.partial_outcome().and_then(|o| o.direct_uri.as_deref()),
            Some("memory://c/p/1.txt")
        );
    }
}
