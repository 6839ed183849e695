use std::fmt;

use blobver_store::{BlobProperties, BlobReader};
use blobver_types::{ETag, VersionId};
use serde::{Deserialize, Serialize};

/// What a publish wrote. Slots for writes that did not happen stay `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub direct_uri: Option<String>,
    pub direct_etag: Option<ETag>,
    pub direct_version: Option<VersionId>,
    pub latest_uri: Option<String>,
    pub latest_etag: Option<ETag>,
    pub latest_number_etag: Option<ETag>,
    pub latest_number: Option<u64>,
}

/// Where the latest object lives and its current ETag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestInfo {
    pub uri: String,
    pub etag: ETag,
}

/// The latest object opened for reading.
pub struct LatestBlob {
    pub uri: String,
    pub properties: BlobProperties,
    pub body: BlobReader,
}

impl LatestBlob {
    pub fn etag(&self) -> &ETag {
        &self.properties.etag
    }
}

impl fmt::Debug for LatestBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatestBlob")
            .field("uri", &self.uri)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}
