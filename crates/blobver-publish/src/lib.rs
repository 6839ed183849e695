//! Versioned publish protocol for blobver.
//!
//! One publish writes a byte stream under two naming conventions in the same
//! container:
//!
//! - a **direct** object at `render(template, version)`, created exactly once
//!   and never overwritten
//! - the **latest** object at `render(template, "latest")`, overwritten on
//!   every publish and always holding the newest committed content
//!
//! Versions are either UTC timestamps or sequence numbers. Number mode keeps
//! the last allocated number on a zero-length marker object at
//! `render(template, 0)`; the marker's ETag is the allocation token.
//!
//! All coordination between concurrent publishers is optimistic: create-only
//! conditions on direct objects and on a fresh marker, ETag matches on latest
//! and on an existing marker. A failed condition surfaces as
//! [`PublishError::Conflict`] and is never retried here.
//!
//! # Modules
//!
//! - [`allocator`] -- version allocation and marker commits
//! - [`publisher`] -- [`Publisher`]: the dual-write protocol and latest reads
//! - [`dedup`] -- [`DedupGate`]: skip publishes whose content is unchanged
//! - [`request`] / [`outcome`] -- request and result values
//! - [`config`] -- [`PublisherConfig`]

pub mod allocator;
pub mod config;
pub mod dedup;
pub mod error;
pub mod outcome;
pub mod publisher;
pub mod request;

#[cfg(test)]
mod testing;

pub use allocator::{Allocation, MarkerUpdate, VersionAllocator, LATEST_NUMBER_KEY};
pub use config::{CopyPollPolicy, PublisherConfig};
pub use dedup::DedupGate;
pub use error::{ObjectRole, PublishError, PublishResult};
pub use outcome::{LatestBlob, LatestInfo, PublishOutcome};
pub use publisher::Publisher;
pub use request::{MarkerExpectation, PublishRequest, VersionStrategy};
