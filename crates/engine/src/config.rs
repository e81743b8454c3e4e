//! Engine configuration via `geostats.toml`
//!
//! A default `geostats.toml` is written on first start. To change settings,
//! edit the file and restart the engine.

use crate::retry::RetryConfig;
use geostats_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed next to the store
pub const CONFIG_FILE_NAME: &str = "geostats.toml";

/// Where recompute work runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecomputeMode {
    /// On the thread that issued the delete; the delete returns once the
    /// affected statistics are clean again
    #[default]
    Inline,
    /// On the recompute worker pool; the delete returns with the affected
    /// statistics marked dirty
    Background,
}

/// Recompute settings (`[recompute]` section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecomputeConfig {
    /// Inline or background recompute
    pub mode: RecomputeMode,
    /// Worker threads in background mode
    pub workers: usize,
    /// Maximum queued recompute tasks before falling back to inline
    pub queue_depth: usize,
    /// Records folded between cancellation checks
    pub cancel_check_interval: usize,
    /// Re-scans of a key that lost its replace write before giving up
    pub max_rescans: usize,
}

impl Default for RecomputeConfig {
    fn default() -> Self {
        Self {
            mode: RecomputeMode::Inline,
            workers: 2,
            queue_depth: 1024,
            cancel_check_interval: 256,
            max_rescans: 8,
        }
    }
}

/// Engine configuration loaded from `geostats.toml`.
///
/// # Example
///
/// ```toml
/// max_update_retries = 16
///
/// [recompute]
/// mode = "background"
/// workers = 4
///
/// [retry]
/// max_retries = 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Read-modify-write attempts per key before `ContentionExceeded`,
    /// not counting the first
    pub max_update_retries: usize,
    /// Recompute settings
    pub recompute: RecomputeConfig,
    /// Backoff for backend outages during recompute
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_update_retries: 16,
            recompute: RecomputeConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Config with background recompute on `workers` threads
    pub fn background(workers: usize) -> Self {
        let mut config = Self::default();
        config.recompute.mode = RecomputeMode::Background;
        config.recompute.workers = workers;
        config
    }

    /// Check values that serde cannot
    ///
    /// # Errors
    ///
    /// Returns `Config` for a zero worker count in background mode, a zero
    /// queue depth or a zero cancellation interval.
    pub fn validate(&self) -> Result<()> {
        let recompute = &self.recompute;
        if recompute.mode == RecomputeMode::Background && recompute.workers == 0 {
            return Err(Error::Config(
                "recompute.workers must be at least 1 in background mode".into(),
            ));
        }
        if recompute.queue_depth == 0 {
            return Err(Error::Config("recompute.queue_depth must be at least 1".into()));
        }
        if recompute.cancel_check_interval == 0 {
            return Err(Error::Config(
                "recompute.cancel_check_interval must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# geostats engine configuration

# Read-modify-write retries per statistic when concurrent writers collide
# (default: 16). Exceeding it fails the update with ContentionExceeded.
max_update_retries = 16

[recompute]
# Where recomputes triggered by deletes run: "inline" (default) or "background"
#   "inline"     = the delete returns once affected statistics are clean
#   "background" = the delete returns at once; statistics stay dirty until
#                  a worker finishes
mode = "inline"

# Worker threads for background mode
workers = 2

# Queued recompute tasks before new ones run inline instead
queue_depth = 1024

# Records folded between cancellation checks
cancel_check_interval = 256

# Re-scans of a statistic that changed during its recompute
max_rescans = 8

[retry]
# Backoff while the store or record source is unavailable
max_retries = 3
base_delay_ms = 10
max_delay_ms = 100
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: EngineConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_inline() {
        let config = EngineConfig::default();
        assert_eq!(config.recompute.mode, RecomputeMode::Inline);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_toml_matches_default() {
        let config: EngineConfig = toml::from_str(EngineConfig::default_toml()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn parse_background_mode() {
        let config: EngineConfig =
            toml::from_str("[recompute]\nmode = \"background\"\nworkers = 4\n").unwrap();
        assert_eq!(config.recompute.mode, RecomputeMode::Background);
        assert_eq!(config.recompute.workers, 4);
        // Unset fields keep their defaults
        assert_eq!(config.recompute.max_rescans, 8);
        assert_eq!(config.max_update_retries, 16);
    }

    #[test]
    fn parse_invalid_mode_returns_error() {
        let parsed: std::result::Result<EngineConfig, _> =
            toml::from_str("[recompute]\nmode = \"eventually\"\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn zero_workers_in_background_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[recompute]\nmode = \"background\"\nworkers = 0\n").unwrap();
        assert!(matches!(EngineConfig::from_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        EngineConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "max_update_retries = 2\n").unwrap();

        EngineConfig::write_default_if_missing(&path).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.max_update_retries, 2);
    }

    #[test]
    fn from_file_missing_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = EngineConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = EngineConfig::background(3);
        config.retry = RetryConfig::no_retry();
        config.write_to_file(&path).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
