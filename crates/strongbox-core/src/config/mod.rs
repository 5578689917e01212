//! Store configuration
//!
//! - `Config`: root store location, default backends and the mount table
//! - `ConfigFile`: YAML persistence (`<config_dir>/strongbox/config.yml`)

mod file;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::backend::{CryptoBackend, StorageBackend};

pub use file::{ConfigFile, CONFIG_ENV};

/// Errors that can occur while loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Mount already exists: {0}")]
    MountExists(String),

    #[error("Mount not found: {0}")]
    MountNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// One mounted sub-store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    pub path: PathBuf,
    /// Backends recorded at mount time; detected when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crypto: Option<CryptoBackend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageBackend>,
}

impl MountConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            crypto: None,
            storage: None,
        }
    }
}

/// Root store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Location of the root store
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crypto: Option<CryptoBackend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageBackend>,
    /// Push versioned stores after each write
    #[serde(default = "default_auto_sync")]
    pub auto_sync: bool,
    #[serde(default)]
    pub mounts: BTreeMap<String, MountConfig>,
}

fn default_auto_sync() -> bool {
    true
}

/// `<home>/.local/share/strongbox/stores/root`
pub fn default_root_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join("strongbox")
        .join("stores")
        .join("root")
}

impl Default for Config {
    fn default() -> Self {
        Self::new(default_root_path())
    }
}

impl Config {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            crypto: None,
            storage: None,
            auto_sync: default_auto_sync(),
            mounts: BTreeMap::new(),
        }
    }

    pub fn add_mount(&mut self, alias: &str, mount: MountConfig) -> ConfigResult<()> {
        if self.mounts.contains_key(alias) {
            return Err(ConfigError::MountExists(alias.to_string()));
        }
        self.mounts.insert(alias.to_string(), mount);
        Ok(())
    }

    pub fn remove_mount(&mut self, alias: &str) -> ConfigResult<MountConfig> {
        self.mounts
            .remove(alias)
            .ok_or_else(|| ConfigError::MountNotFound(alias.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.path.ends_with("strongbox/stores/root"));
        assert!(config.auto_sync);
        assert!(config.mounts.is_empty());
    }

    #[test]
    fn test_mount_table() {
        let mut config = Config::new("/srv/root");
        config.add_mount("work", MountConfig::new("/srv/work")).unwrap();
        assert!(matches!(
            config.add_mount("work", MountConfig::new("/elsewhere")),
            Err(ConfigError::MountExists(_))
        ));
        assert_eq!(config.remove_mount("work").unwrap().path, PathBuf::from("/srv/work"));
        assert!(matches!(config.remove_mount("work"), Err(ConfigError::MountNotFound(_))));
    }

    #[test]
    fn test_yaml_shape() {
        let yaml = "path: /srv/root\ncrypto: age\nmounts:\n  work:\n    path: /srv/work\n    storage: gitfs\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.crypto, Some(CryptoBackend::Age));
        assert!(config.auto_sync);
        let work = &config.mounts["work"];
        assert_eq!(work.storage, Some(StorageBackend::GitFs));
        assert_eq!(work.crypto, None);
    }
}
