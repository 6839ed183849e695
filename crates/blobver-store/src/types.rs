//! Values exchanged with a [`BlobStore`](crate::BlobStore).

use std::collections::BTreeMap;
use std::fmt;
use std::io;

use blobver_digest::ContentDigest;
use blobver_types::ETag;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::ConflictKind;

/// Streaming object content.
///
/// The reader is owned by whoever opened it and is released when dropped.
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Wrap an in-memory buffer as a [`BlobReader`].
pub fn reader_from(data: impl Into<Bytes>) -> BlobReader {
    Box::new(std::io::Cursor::new(data.into()))
}

/// Drain a reader into memory.
pub async fn read_all<R>(reader: &mut R) -> io::Result<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(Bytes::from(buf))
}

/// Precondition attached to a write.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteCondition {
    /// Write unconditionally.
    #[default]
    None,
    /// Write only if no object exists at the path (`If-None-Match: *`).
    IfNotExists,
    /// Write only if the object's current ETag equals this one (`If-Match`).
    IfMatch(ETag),
}

impl WriteCondition {
    /// Build the condition for an optional expected ETag: a known ETag means
    /// `IfMatch`, no ETag means the caller expects no object.
    pub fn expecting(etag: Option<&ETag>) -> Self {
        match etag {
            Some(etag) => WriteCondition::IfMatch(etag.clone()),
            None => WriteCondition::IfNotExists,
        }
    }

    /// Check the condition against the object's current ETag (`None` if absent).
    pub fn check(&self, current: Option<&ETag>) -> Result<(), ConflictKind> {
        match (self, current) {
            (WriteCondition::None, _) => Ok(()),
            (WriteCondition::IfNotExists, None) => Ok(()),
            (WriteCondition::IfNotExists, Some(_)) => Err(ConflictKind::AlreadyExists),
            (WriteCondition::IfMatch(expected), Some(actual)) if expected == actual => Ok(()),
            (WriteCondition::IfMatch(_), _) => Err(ConflictKind::ETagMismatch),
        }
    }
}

impl fmt::Display for WriteCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteCondition::None => f.write_str("none"),
            WriteCondition::IfNotExists => f.write_str("If-None-Match: *"),
            WriteCondition::IfMatch(etag) => write!(f, "If-Match: {etag}"),
        }
    }
}

/// Everything applied atomically with a write besides the content itself.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub condition: WriteCondition,
}

impl WriteOptions {
    pub fn new(condition: WriteCondition) -> Self {
        Self {
            condition,
            ..Default::default()
        }
    }

    pub fn with_content_type(mut self, content_type: Option<&str>) -> Self {
        self.content_type = content_type
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Properties of a stored object, as returned by a head request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobProperties {
    pub etag: ETag,
    pub content_type: Option<String>,
    /// MD5 of the content, when the backend records one.
    pub content_md5: Option<ContentDigest>,
    pub size: u64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub last_modified: DateTime<Utc>,
}

/// An open object: its properties plus a reader over its content.
pub struct BlobRead {
    pub properties: BlobProperties,
    pub body: BlobReader,
}

impl fmt::Debug for BlobRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobRead")
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

/// Token for an in-flight server-side copy.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CopyHandle {
    pub id: String,
    pub container: String,
    pub destination: String,
}

/// State of a server-side copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CopyStatus {
    Pending,
    /// The destination now holds the source content under `etag`.
    Done { etag: ETag },
    Failed { reason: String },
}

/// One entry of a listing page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobItem {
    pub path: String,
    pub etag: ETag,
    pub size: u64,
}

/// A page of listing results.
#[derive(Clone, Debug, Default)]
pub struct ListPage {
    pub items: Vec<BlobItem>,
    /// Pass back to `list` to fetch the next page; `None` when exhausted.
    pub continuation: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_checks() {
        let e1 = ETag::from("1");
        let e2 = ETag::from("2");

        assert!(WriteCondition::None.check(None).is_ok());
        assert!(WriteCondition::None.check(Some(&e1)).is_ok());

        assert!(WriteCondition::IfNotExists.check(None).is_ok());
        assert_eq!(
            WriteCondition::IfNotExists.check(Some(&e1)),
            Err(ConflictKind::AlreadyExists)
        );

        let if_match = WriteCondition::IfMatch(e1.clone());
        assert!(if_match.check(Some(&e1)).is_ok());
        assert_eq!(if_match.check(Some(&e2)), Err(ConflictKind::ETagMismatch));
        assert_eq!(if_match.check(None), Err(ConflictKind::ETagMismatch));
    }

    #[test]
    fn expecting_maps_absent_etag_to_create_only() {
        assert_eq!(WriteCondition::expecting(None), WriteCondition::IfNotExists);
        let e = ETag::from("x");
        assert_eq!(
            WriteCondition::expecting(Some(&e)),
            WriteCondition::IfMatch(e.clone())
        );
    }

    #[test]
    fn blank_content_type_is_dropped() {
        let opts = WriteOptions::default().with_content_type(Some("  "));
        assert!(opts.content_type.is_none());
        let opts = WriteOptions::default().with_content_type(Some("text/plain"));
        assert_eq!(opts.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn reader_round_trips_buffer() {
        let mut reader = reader_from(&b"hello"[..]);
        assert_eq!(read_all(&mut reader).await.unwrap(), Bytes::from_static(b"hello"));
    }
}
