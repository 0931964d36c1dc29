//! Node configuration, loaded from a YAML file the same way the donor's
//! validator client configuration is loaded elsewhere in the pack.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration for a single beacon node process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory holding the `chain_store` sled database.
    pub data_dir: PathBuf,
    /// Capacity of each broadcast feed (`CanonicalBlockFeed`,
    /// `StateInitializedFeed`, `IncomingProcessedBlockFeed`).
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
    /// Upper bound on concurrently live worker threads; `status()` reports
    /// unhealthy once this is exceeded.
    #[serde(default = "default_max_routines")]
    pub max_routines: usize,
    /// Whether BLS signatures are verified during block admission and
    /// fork-choice's `on_block`. Disabling this is unsafe for anything but
    /// local testing against unsigned fixtures.
    #[serde(default = "default_verify_signatures")]
    pub verify_signatures: bool,
}

fn default_feed_capacity() -> usize {
    16
}

fn default_max_routines() -> usize {
    8
}

fn default_verify_signatures() -> bool {
    true
}

impl NodeConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config = serde_yaml::from_reader(file)?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read node configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse node configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_fill_in_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "data_dir: /var/lib/beacon").unwrap();

        let config = NodeConfig::from_yaml_file(file.path()).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/beacon"));
        assert_eq!(config.feed_capacity, default_feed_capacity());
        assert_eq!(config.max_routines, default_max_routines());
        assert_eq!(config.verify_signatures, default_verify_signatures());
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "data_dir: /var/lib/beacon\nfeed_capacity: 64\nmax_routines: 2\nverify_signatures: false"
        )
        .unwrap();

        let config = NodeConfig::from_yaml_file(file.path()).unwrap();

        assert_eq!(config.feed_capacity, 64);
        assert_eq!(config.max_routines, 2);
        assert!(!config.verify_signatures);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let error = NodeConfig::from_yaml_file("/nonexistent/path/to/config.yaml").unwrap_err();
        assert!(matches!(error, ConfigError::Io(_)));
    }
}
