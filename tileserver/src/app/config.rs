//! Application configuration for `TileServerApp`.

use std::path::PathBuf;

use crate::config::ConfigFile;
use crate::render::GeoBounds;

/// Everything the bootstrap needs to build the shared tile service.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Root of the live cache; created and probed at startup.
    pub cache_directory: PathBuf,

    /// Optional read-only tree of prerendered tiles.
    pub prerendered_directory: Option<PathBuf>,

    /// Directory holding `*.map` files.
    pub map_directory: PathBuf,

    /// Style theme file.
    pub theme_file: PathBuf,

    /// Geographic coverage of the map data.
    pub coverage: GeoBounds,
}

impl AppConfig {
    pub fn new(
        cache_directory: impl Into<PathBuf>,
        map_directory: impl Into<PathBuf>,
        theme_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cache_directory: cache_directory.into(),
            prerendered_directory: None,
            map_directory: map_directory.into(),
            theme_file: theme_file.into(),
            coverage: GeoBounds::world(),
        }
    }

    pub fn with_prerendered_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prerendered_directory = Some(dir.into());
        self
    }

    pub fn with_coverage(mut self, coverage: GeoBounds) -> Self {
        self.coverage = coverage;
        self
    }
}

impl From<&ConfigFile> for AppConfig {
    fn from(config: &ConfigFile) -> Self {
        Self {
            cache_directory: config.cache.directory.clone(),
            prerendered_directory: config.cache.prerendered_directory.clone(),
            map_directory: config.map.data_directory.clone(),
            theme_file: config.map.theme_file.clone(),
            coverage: config.map.coverage,
        }
    }
}
