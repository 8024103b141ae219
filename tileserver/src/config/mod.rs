//! Configuration module
//!
//! Reads `~/.tileserver/config.ini` (or an explicit path) into typed
//! settings. Values are validated while parsing; a missing file yields the
//! defaults.
//!
//! ```ini
//! [cache]
//! directory = ~/.tileserver/cache
//!
//! [prerender]
//! staleness = age
//! max_age_secs = 1209600
//!
//! [area.germany]
//! min_x = 65
//! min_y = 40
//! max_x = 69
//! max_y = 44
//! max_zoom = 12
//! ```

mod defaults;
mod file;
mod parser;
mod settings;

pub use defaults::{default_socket_workers, num_cpus, DEFAULT_HTTP_PORT, DEFAULT_SOCKET_PORT};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    CacheSettings, ConfigFile, LoggingSettings, MapSettings, PrerenderSettings, QueueSettings,
    ServerSettings, StalenessMode,
};
