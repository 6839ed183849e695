use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollapseError {
    #[error("store error: {0}")]
    Store(#[from] blobver_store::StoreError),

    #[error("I/O error comparing content: {0}")]
    Io(#[from] std::io::Error),
}

pub type CollapseResult<T> = Result<T, CollapseError>;
