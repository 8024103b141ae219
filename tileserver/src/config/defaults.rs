//! Default values and constants for all configuration settings.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;
use crate::cache::{DEFAULT_MAX_AGE, DEFAULT_ZOOM_CEILING};
use crate::frontend::queue::{DEFAULT_POLL_TIMEOUT, DEFAULT_SCAN_INTERVAL};
use crate::prerender::{PrerenderArea, DEFAULT_GLOBAL_MAX_ZOOM, DEFAULT_INTERVAL};
use crate::render::GeoBounds;

pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_SOCKET_PORT: u16 = 8001;

/// Get the number of available CPU cores.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Default socket pool size: num_cpus × 2, minimum 1.
pub fn default_socket_workers() -> usize {
    (num_cpus() * 2).max(1)
}

fn any_addr(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
}

fn in_config_dir(name: &str) -> PathBuf {
    config_directory().join(name)
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cache: CacheSettings {
                directory: in_config_dir("cache"),
                prerendered_directory: None,
            },
            map: MapSettings {
                data_directory: in_config_dir("maps"),
                theme_file: in_config_dir("theme.xml"),
                coverage: GeoBounds::world(),
            },
            server: ServerSettings {
                http_bind: any_addr(DEFAULT_HTTP_PORT),
                socket_bind: any_addr(DEFAULT_SOCKET_PORT),
                socket_workers: default_socket_workers(),
            },
            queue: QueueSettings {
                directory: in_config_dir("queue"),
                output_directory: None,
                poll_timeout: DEFAULT_POLL_TIMEOUT,
                scan_interval: DEFAULT_SCAN_INTERVAL,
            },
            prerender: PrerenderSettings {
                enabled: true,
                global_max_zoom: DEFAULT_GLOBAL_MAX_ZOOM,
                interval: DEFAULT_INTERVAL,
                staleness: StalenessMode::Age,
                max_age: DEFAULT_MAX_AGE,
                zoom_ceiling: DEFAULT_ZOOM_CEILING,
                skip_unchanged: false,
                run_once: false,
            },
            areas: vec![PrerenderArea::germany()],
            logging: LoggingSettings {
                file: in_config_dir("tileserver.log"),
            },
        }
    }
}
