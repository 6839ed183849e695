//! Content digests for blobver.
//!
//! The dedup gate uses a digest as a cheap first check before falling back to
//! a full equality comparison. Object stores commonly expose an MD5 of the
//! stored content (`Content-MD5`), so that is the digest computed here.
//! Collisions are not defended against: a digest match is treated as "same
//! content" and nothing more.

pub mod hasher;

pub use hasher::{digest_reader, ContentDigest, DigestError, IncrementalDigest, DEFAULT_CHUNK_SIZE};
