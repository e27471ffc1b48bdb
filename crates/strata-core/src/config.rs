//! Repository configuration stored in `.strata/config.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StrataResult;
use crate::fsutil::atomic_write;

/// Settings read at `open` time. Missing keys fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Branch created by `init`.
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// How long to wait for the reference-table lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl RepoConfig {
    pub const FILE: &'static str = "config.toml";

    /// Load from `path`, or return defaults if the file is absent.
    pub fn load(path: &Path) -> StrataResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        Ok(toml::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> StrataResult<()> {
        let data = toml::to_string_pretty(self)?;
        atomic_write(path, data.as_bytes())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let cfg = RepoConfig::load(&dir.path().join(RepoConfig::FILE)).unwrap();
        assert_eq!(cfg, RepoConfig::default());
        assert_eq!(cfg.default_branch, "master");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(RepoConfig::FILE);
        fs::write(&path, "default_branch = \"main\"\n").unwrap();
        let cfg = RepoConfig::load(&path).unwrap();
        assert_eq!(cfg.default_branch, "main");
        assert_eq!(cfg.lock_timeout_ms, 5000);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(RepoConfig::FILE);
        let cfg = RepoConfig {
            default_branch: "trunk".to_string(),
            lock_timeout_ms: 250,
        };
        cfg.save(&path).unwrap();
        assert_eq!(RepoConfig::load(&path).unwrap(), cfg);
        assert_eq!(cfg.lock_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(RepoConfig::FILE);
        fs::write(&path, "default_branch = [").unwrap();
        assert!(RepoConfig::load(&path).is_err());
    }
}
