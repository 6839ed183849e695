//! Foundation types for blobver.
//!
//! blobver publishes a byte stream to an object store twice: once as an
//! immutable, uniquely-versioned *direct* object and once as a mutable
//! *latest* object. Every other blobver crate depends on `blobver-types`.
//!
//! # Key Types
//!
//! - [`PathTemplate`] — validated single-placeholder path template (`logs/{0}.txt`)
//! - [`VersionId`] — timestamp or sequence number substituted into a template
//! - [`ETag`] — opaque optimistic-concurrency token handed out by the store
//! - [`Clock`] — injectable source of UTC time

pub mod error;
pub mod etag;
pub mod template;
pub mod temporal;
pub mod version;

pub use error::TypeError;
pub use etag::ETag;
pub use template::{PathTemplate, LATEST_SEGMENT};
pub use temporal::{format_timestamp, Clock, FixedClock, SystemClock};
pub use version::VersionId;
