//! Lookup engine configuration loaded from TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LookupError, Result};

const DEFAULT_VID_LEN: usize = 8;
const DEFAULT_MAX_PARTITIONS: usize = 1024;

/// Runtime knobs for [`crate::lookup::LookupProcessor`].
///
/// Every field is optional in the TOML form; missing keys take the values of
/// [`LookupConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Run partitions on a worker pool instead of the calling thread.
    pub parallel: bool,
    /// Worker pool size; `0` lets rayon pick.
    pub worker_threads: usize,
    /// Fail the partition when an index entry points at a missing base record.
    pub fatal_on_base_not_found: bool,
    /// Fixed length of vertex ids inside keys.
    pub vid_len: usize,
    /// Upper bound on the partitions a single request may name.
    pub max_partitions: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            worker_threads: 0,
            fatal_on_base_not_found: false,
            vid_len: DEFAULT_VID_LEN,
            max_partitions: DEFAULT_MAX_PARTITIONS,
        }
    }
}

impl LookupConfig {
    /// Runs every partition on the calling thread.
    pub fn sequential() -> Self {
        Self::default()
    }

    /// Runs partitions on a pool of `threads` workers.
    pub fn parallel(threads: usize) -> Self {
        Self {
            parallel: true,
            worker_threads: threads,
            ..Self::default()
        }
    }

    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: LookupConfig =
            toml::from_str(text).map_err(|err| LookupError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Renders the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|err| LookupError::Config(err.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if self.vid_len == 0 {
            return Err(LookupError::Config("vid_len must be positive".into()));
        }
        if self.max_partitions == 0 {
            return Err(LookupError::Config("max_partitions must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() -> Result<()> {
        let config = LookupConfig::from_toml_str("parallel = true\n")?;
        assert!(config.parallel);
        assert_eq!(config.vid_len, DEFAULT_VID_LEN);
        assert!(!config.fatal_on_base_not_found);
        Ok(())
    }

    #[test]
    fn rejects_zero_vid_len() {
        let err = LookupConfig::from_toml_str("vid_len = 0").unwrap_err();
        assert!(matches!(err, LookupError::Config(_)));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = LookupConfig::from_toml_str("parallel = [").unwrap_err();
        assert!(matches!(err, LookupError::Config(_)));
    }

    #[test]
    fn round_trips_through_toml() -> Result<()> {
        let config = LookupConfig::parallel(4);
        let text = config.to_toml_string()?;
        assert_eq!(LookupConfig::from_toml_str(&text)?, config);
        Ok(())
    }
}
