use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the publisher waits for a server-side copy onto the latest object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyPollPolicy {
    /// Delay between status polls.
    pub interval: Duration,
    /// Give up with [`PublishError::TimedOut`](crate::PublishError::TimedOut)
    /// once a copy has been pending this long.
    pub deadline: Duration,
}

impl Default for CopyPollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            deadline: Duration::from_secs(60),
        }
    }
}

/// Configuration for a [`Publisher`](crate::Publisher).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub copy_poll: CopyPollPolicy,
    /// Read size used when digesting and comparing content.
    pub chunk_size: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            copy_poll: CopyPollPolicy::default(),
            chunk_size: blobver_digest::DEFAULT_CHUNK_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PublisherConfig::default();
        assert_eq!(config.copy_poll.interval, Duration::from_millis(100));
        assert_eq!(config.copy_poll.deadline, Duration::from_secs(60));
        assert_eq!(config.chunk_size, 8192);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PublisherConfig = serde_json::from_str(r#"{"chunk_size": 1024}"#).unwrap();
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.copy_poll, CopyPollPolicy::default());
    }
}
