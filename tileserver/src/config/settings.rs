//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing logic.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::StalenessPolicy;
use crate::prerender::{PrerenderArea, PrerenderConfig};
use crate::render::GeoBounds;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Tile cache settings
    pub cache: CacheSettings,
    /// Map data and theme settings
    pub map: MapSettings,
    /// HTTP and socket listener settings
    pub server: ServerSettings,
    /// File-queue settings
    pub queue: QueueSettings,
    /// Prerender scheduler settings
    pub prerender: PrerenderSettings,
    /// Named prerender areas, one `[area.<name>]` section each
    pub areas: Vec<PrerenderArea>,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Root of the live tile cache
    pub directory: PathBuf,
    /// Read-only tree of prerendered tiles, checked first by the socket front end
    pub prerendered_directory: Option<PathBuf>,
}

/// Map data configuration.
#[derive(Debug, Clone)]
pub struct MapSettings {
    /// Directory holding `*.map` files
    pub data_directory: PathBuf,
    /// Style theme file
    pub theme_file: PathBuf,
    /// Area covered by the map data; tiles outside are unsupported
    pub coverage: GeoBounds,
}

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub http_bind: SocketAddr,
    pub socket_bind: SocketAddr,
    /// Concurrent socket connections
    pub socket_workers: usize,
}

/// File-queue configuration.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Directory where `*.request` markers appear
    pub directory: PathBuf,
    /// Where queued tiles are written; the cache directory when unset
    pub output_directory: Option<PathBuf>,
    pub poll_timeout: Duration,
    pub scan_interval: Duration,
}

/// Which staleness policy a deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalenessMode {
    Age,
    Zoom,
}

/// Prerender scheduler configuration.
#[derive(Debug, Clone)]
pub struct PrerenderSettings {
    pub enabled: bool,
    pub global_max_zoom: u8,
    pub interval: Duration,
    pub staleness: StalenessMode,
    pub max_age: Duration,
    pub zoom_ceiling: u8,
    pub skip_unchanged: bool,
    pub run_once: bool,
}

impl PrerenderSettings {
    /// The active staleness policy.
    pub fn staleness_policy(&self) -> StalenessPolicy {
        match self.staleness {
            StalenessMode::Age => StalenessPolicy::MaxAge(self.max_age),
            StalenessMode::Zoom => StalenessPolicy::ZoomCeiling(self.zoom_ceiling),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

impl ConfigFile {
    /// Scheduler configuration derived from `[prerender]` and the areas.
    pub fn prerender_config(&self) -> PrerenderConfig {
        PrerenderConfig {
            global_max_zoom: self.prerender.global_max_zoom,
            areas: self.areas.clone(),
            interval: self.prerender.interval,
            staleness: self.prerender.staleness_policy(),
            skip_unchanged: self.prerender.skip_unchanged,
            run_once: self.prerender.run_once,
        }
    }

    /// Directory the file queue renders into.
    pub fn queue_output_directory(&self) -> &PathBuf {
        self.queue
            .output_directory
            .as_ref()
            .unwrap_or(&self.cache.directory)
    }
}
