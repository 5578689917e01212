//! YAML configuration file

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Config, ConfigResult};

/// Environment variable overriding the configuration file location
pub const CONFIG_ENV: &str = "STRONGBOX_CONFIG";

/// Configuration file on disk
///
/// # Example
///
/// ```no_run
/// use strongbox_core::config::ConfigFile;
///
/// let file = ConfigFile::user();
/// let config = file.load().unwrap();
/// println!("root store at {}", config.path.display());
/// ```
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$STRONGBOX_CONFIG`, or `<config_dir>/strongbox/config.yml`
    pub fn user() -> Self {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::new(path);
        }
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        Self::new(config_dir.join("strongbox").join("config.yml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the configuration; a missing file yields the defaults
    pub fn load(&self) -> ConfigResult<Config> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(config)?;
        fs::write(&self.path, content)?;
        debug!(path = %self.path.display(), "saved config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MountConfig;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let file = ConfigFile::new(dir.path().join("config.yml"));
        assert!(!file.exists());
        assert_eq!(file.load().unwrap(), Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let file = ConfigFile::new(dir.path().join("nested/config.yml"));

        let mut config = Config::new(dir.path().join("root"));
        config.auto_sync = false;
        config.add_mount("work", MountConfig::new(dir.path().join("work"))).unwrap();
        file.save(&config).unwrap();

        assert_eq!(file.load().unwrap(), config);
    }

    #[test]
    fn test_invalid_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "path: [unclosed").unwrap();
        assert!(ConfigFile::new(path).load().is_err());
    }
}
