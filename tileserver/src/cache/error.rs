//! Tile cache errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during tile cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache root could not be created or written to.
    #[error("Cache directory {} is not writable: {source}", path.display())]
    NotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on a specific cache path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A background sweep task was cancelled or panicked.
    #[error("Sweep task failed: {0}")]
    SweepTask(String),
}
