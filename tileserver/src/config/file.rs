//! Loading the INI configuration file.

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::settings::ConfigFile;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigFile {
    /// Load configuration from the default path (~/.tileserver/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(content).map_err(ini::Error::Parse)?;
        super::parser::parse_ini(&ini)
    }
}

/// Get the path to the config directory (~/.tileserver).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tileserver")
}

/// Get the path to the config file (~/.tileserver/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StalenessPolicy;
    use crate::prerender::PrerenderArea;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();

        assert_eq!(config.server.http_bind.port(), 8000);
        assert_eq!(config.server.socket_bind.port(), 8001);
        assert!(config.server.socket_workers >= 1);
        assert_eq!(config.prerender.global_max_zoom, 6);
        assert_eq!(config.prerender.interval.as_secs(), 7200);
        assert_eq!(config.areas, vec![PrerenderArea::germany()]);
        assert_eq!(
            config.prerender.staleness_policy(),
            StalenessPolicy::MaxAge(std::time::Duration::from_secs(1_209_600))
        );
        assert!(config.cache.directory.ends_with(".tileserver/cache"));
        assert_eq!(config.queue_output_directory(), &config.cache.directory);
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.ini");

        let config = ConfigFile::load_from(&config_path).unwrap();

        assert_eq!(config.prerender.global_max_zoom, 6);
        assert_eq!(config.areas.len(), 1);
    }

    #[test]
    fn test_config_file_path() {
        assert!(config_file_path().ends_with(".tileserver/config.ini"));
    }
}
