use serde::{Deserialize, Serialize};

/// Configuration for a [`Collapser`](crate::Collapser).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollapseConfig {
    /// Read size for streaming comparisons.
    pub chunk_size: usize,
    /// Scan and report without deleting anything.
    pub dry_run: bool,
}

impl Default for CollapseConfig {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            dry_run: false,
        }
    }
}
