use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// The path template does not contain exactly one `{0}` placeholder.
    #[error("invalid path template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },
}
