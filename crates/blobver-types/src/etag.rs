use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque entity tag returned by the blob store.
///
/// Two equal ETags for the same path mean the object's content and metadata
/// were byte-identical when each was observed. blobver never interprets the
/// value; it only hands it back to the store as a write precondition.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    /// Wrap a raw ETag value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw ETag value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ETag({})", self.0)
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ETag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ETag {
    fn from(value: String) -> Self {
        Self(value)
    }
}
