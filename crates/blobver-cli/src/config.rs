use std::path::{Path, PathBuf};

use anyhow::Context;
use blobver_collapse::CollapseConfig;
use blobver_publish::PublisherConfig;
use serde::{Deserialize, Serialize};

/// Settings loaded from `--config`. Command-line flags take precedence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub root: Option<PathBuf>,
    pub publisher: PublisherConfig,
    pub collapse: CollapseConfig,
}

impl CliConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn missing_path_gives_defaults() {
        assert_eq!(CliConfig::load(None).unwrap(), CliConfig::default());
    }

    #[test]
    fn loads_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobver.toml");
        std::fs::write(
            &path,
            r#"
root = "/srv/blobs"

[publisher]
chunk_size = 4096

[publisher.copy_poll.deadline]
secs = 5
nanos = 0

[collapse]
dry_run = true
"#,
        )
        .unwrap();

        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config.root, Some(PathBuf::from("/srv/blobs")));
        assert_eq!(config.publisher.chunk_size, 4096);
        assert_eq!(config.publisher.copy_poll.deadline, Duration::from_secs(5));
        assert_eq!(config.publisher.copy_poll.interval, Duration::from_millis(100));
        assert!(config.collapse.dry_run);
        assert_eq!(config.collapse.chunk_size, 8192);
    }

    #[test]
    fn reports_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "publisher = 3").unwrap();
        let err = CliConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
        assert!(CliConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
