use blobver_types::{ETag, PathTemplate};
use serde::{Deserialize, Serialize};

/// What the caller expects of the latest-number marker.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerExpectation {
    /// Read the marker and use whatever ETag it has now.
    #[default]
    Read,
    /// The marker must not exist yet; it is created with `If-None-Match: *`.
    Absent,
    /// The marker must still carry this ETag.
    Match(ETag),
}

/// How the direct object's version identifier is chosen.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionStrategy {
    /// The current UTC time from the publisher's clock.
    #[default]
    Timestamp,
    /// The next sequence number from the latest-number marker.
    Number {
        marker: MarkerExpectation,
        /// Use this number instead of the stored one plus one.
        next_number: Option<u64>,
    },
}

impl VersionStrategy {
    /// Number mode with the marker read at publish time.
    pub fn number() -> Self {
        VersionStrategy::Number {
            marker: MarkerExpectation::Read,
            next_number: None,
        }
    }
}

/// Everything a publish needs except the content itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub container: String,
    pub template: PathTemplate,
    pub content_type: Option<String>,
    pub write_direct: bool,
    pub write_latest: bool,
    pub strategy: VersionStrategy,
    /// The caller's view of the latest object: `Some` for its current ETag,
    /// `None` for "it does not exist yet".
    pub latest_etag: Option<ETag>,
    /// Guard the latest write with `latest_etag`. When `false` the latest
    /// object is overwritten unconditionally.
    pub use_etags: bool,
}

impl PublishRequest {
    /// Write both direct and latest with a timestamp version, ETag-guarded.
    pub fn new(container: impl Into<String>, template: PathTemplate) -> Self {
        Self {
            container: container.into(),
            template,
            content_type: None,
            write_direct: true,
            write_latest: true,
            strategy: VersionStrategy::Timestamp,
            latest_etag: None,
            use_etags: true,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_strategy(mut self, strategy: VersionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_latest_etag(mut self, etag: Option<ETag>) -> Self {
        self.latest_etag = etag;
        self
    }

    pub fn direct(mut self, write: bool) -> Self {
        self.write_direct = write;
        self
    }

    pub fn latest(mut self, write: bool) -> Self {
        self.write_latest = write;
        self
    }

    pub fn use_etags(mut self, use_etags: bool) -> Self {
        self.use_etags = use_etags;
        self
    }
}
