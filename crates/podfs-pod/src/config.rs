use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PodError, PodResult};

/// Tunables for a [`PodEngine`](crate::PodEngine).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Block size for uploads that do not name one.
    pub default_block_size: u32,
    /// Largest block size an upload may ask for.
    pub max_block_size: u32,
    /// Upper bound on concurrent resolutions while synchronizing a pod.
    pub sync_workers: usize,
    /// Number of pod slots per account.
    pub max_pods: usize,
    /// Longest accepted pod, directory or file name, in bytes.
    pub max_name_len: usize,
    /// Entries kept by the caching store layer; 0 disables it.
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_block_size: 1024 * 1024,
            max_block_size: podfs_file::DEFAULT_MAX_BLOCK_SIZE,
            sync_workers: 8,
            max_pods: 128,
            max_name_len: 25,
            cache_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Parse from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> PodResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| PodError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> PodResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> PodResult<String> {
        toml::to_string_pretty(self).map_err(|e| PodError::Config(e.to_string()))
    }

    fn validate(&self) -> PodResult<()> {
        if self.default_block_size == 0 {
            return Err(PodError::Config("default_block_size must be > 0".into()));
        }
        if self.default_block_size > self.max_block_size {
            return Err(PodError::Config(
                "default_block_size must not exceed max_block_size".into(),
            ));
        }
        if self.sync_workers == 0 {
            return Err(PodError::Config("sync_workers must be > 0".into()));
        }
        if self.max_name_len == 0 {
            return Err(PodError::Config("max_name_len must be > 0".into()));
        }
        Ok(())
    }
}
