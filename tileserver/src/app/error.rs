//! Application error types.

use std::fmt;

use crate::cache::CacheError;
use crate::map::MapError;

/// Fatal errors raised while bringing the application up.
#[derive(Debug)]
pub enum AppError {
    /// The cache directory cannot be created or written.
    Cache(CacheError),

    /// Map data directory unreadable or empty, or theme missing.
    MapData(MapError),

    /// A listener could not be bound or a worker thread not spawned.
    Io(std::io::Error),

    /// Failed to create the Tokio runtime.
    RuntimeCreation(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Cache(e) => write!(f, "Tile cache unavailable: {}", e),
            AppError::MapData(e) => write!(f, "Map data unavailable: {}", e),
            AppError::Io(e) => write!(f, "I/O error: {}", e),
            AppError::RuntimeCreation(msg) => {
                write!(f, "Failed to create Tokio runtime: {}", msg)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Cache(e) => Some(e),
            AppError::MapData(e) => Some(e),
            AppError::Io(e) => Some(e),
            AppError::RuntimeCreation(_) => None,
        }
    }
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        AppError::Cache(e)
    }
}

impl From<MapError> for AppError {
    fn from(e: MapError) -> Self {
        AppError::MapData(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e)
    }
}
