//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::process;

use tileserver::app::AppError;
use tileserver::cache::CacheError;
use tileserver::config::ConfigFileError;
use tileserver::map::MapError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be read or holds an invalid value
    Config(ConfigFileError),
    /// A startup check failed
    Startup(AppError),
    /// Tile cache operation failed
    Cache(CacheError),
    /// A front end could not bind or stopped with an error
    Serve {
        front_end: &'static str,
        addr: Option<SocketAddr>,
        error: io::Error,
    },
    /// Ctrl-C handler could not be installed
    SignalHandler(String),
    /// A worker thread panicked
    WorkerPanicked(&'static str),
    /// Argument rejected after parsing
    InvalidArgument(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Startup(AppError::MapData(MapError::NoMapFiles { .. }))
            | CliError::Startup(AppError::MapData(MapError::Unreadable { .. })) => {
                eprintln!();
                eprintln!("The server needs at least one *.map file:");
                eprintln!("  1. Check data_directory in the [map] section of config.ini");
                eprintln!("  2. Make sure the directory is readable by this user");
            }
            CliError::Startup(AppError::MapData(MapError::ThemeMissing { .. })) => {
                eprintln!();
                eprintln!("Set theme_file in the [map] section of config.ini");
            }
            CliError::Startup(AppError::Cache(_)) | CliError::Cache(_) => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. Permissions: the cache directory must be writable");
                eprintln!("  2. Disk full or read-only file system");
            }
            CliError::Serve { error, .. } if error.kind() == io::ErrorKind::AddrInUse => {
                eprintln!();
                eprintln!("Another process is listening on that address.");
                eprintln!("Pick another one with --bind or in the [server] section.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Startup(e) => write!(f, "Startup failed: {}", e),
            CliError::Cache(e) => write!(f, "Cache error: {}", e),
            CliError::Serve {
                front_end,
                addr: Some(addr),
                error,
            } => write!(f, "{} front end on {} failed: {}", front_end, addr, error),
            CliError::Serve {
                front_end, error, ..
            } => write!(f, "{} front end failed: {}", front_end, error),
            CliError::SignalHandler(msg) => {
                write!(f, "Failed to set signal handler: {}", msg)
            }
            CliError::WorkerPanicked(name) => write!(f, "Worker thread '{}' panicked", name),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Startup(e) => Some(e),
            CliError::Cache(e) => Some(e),
            CliError::Serve { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self {
        CliError::Startup(e)
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        CliError::Cache(e)
    }
}
