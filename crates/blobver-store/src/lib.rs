//! Blob store capability for blobver.
//!
//! The publish protocol and the collapse engine talk to object storage only
//! through the [`BlobStore`] trait. A backend supplies named containers of
//! blobs, each blob carrying an opaque [`ETag`](blobver_types::ETag) that
//! changes on every content or metadata change.
//!
//! # Storage Backends
//!
//! - [`InMemoryBlobStore`] -- map-backed store for tests and embedding, with
//!   knobs for listing page size and copy latency
//! - [`FsBlobStore`] -- local directory store used by the command-line tool
//!
//! # Contract
//!
//! 1. Conditional writes are atomic: the condition check and the commit are
//!    one step from every caller's point of view.
//! 2. A failed condition is an error ([`StoreError::Conflict`]), never a
//!    silent no-op, and is never retried by the store.
//! 3. Reads of a single key observe the most recent committed write.
//! 4. Missing objects read as `None`; only operations that require an
//!    existing object fail with [`StoreError::NotFound`].
//! 5. Listing order within a page is by path; pagination is driven by the
//!    caller through the continuation token.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{ConflictKind, StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use memory::{CopyLatency, InMemoryBlobStore};
pub use traits::BlobStore;
pub use types::{
    read_all, reader_from, BlobItem, BlobProperties, BlobRead, BlobReader, CopyHandle,
    CopyStatus, ListPage, WriteCondition, WriteOptions,
};
