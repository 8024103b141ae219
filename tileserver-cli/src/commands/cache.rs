//! Cache management CLI commands.

use std::time::SystemTime;

use clap::Subcommand;
use tileserver::cache::TileCacheStore;
use tileserver::coord::MAX_ZOOM;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Apply the configured staleness policy once
    Sweep,
    /// Show entries and size per zoom level
    Stats,
    /// Delete every cached tile of one zoom level
    ClearZoom {
        /// Zoom level to delete
        zoom: u8,
    },
}

/// Run a cache subcommand.
pub fn run(runner: &CliRunner, action: CacheAction) -> Result<(), CliError> {
    runner.log_startup("cache");
    let config = runner.config();
    let cache_dir = &config.cache.directory;

    match action {
        CacheAction::Sweep => {
            let policy = config.prerender.staleness_policy();
            println!("Sweeping {} ({})", cache_dir.display(), policy);

            let store = TileCacheStore::open(cache_dir)?;
            let result = policy.sweep(&store, SystemTime::now())?;
            println!("{}", result);
            Ok(())
        }
        CacheAction::Stats => {
            println!("Tile cache: {}", cache_dir.display());

            let stats = TileCacheStore::at(cache_dir).stats();
            if stats.is_empty() {
                println!("  (empty)");
                return Ok(());
            }

            println!("  {:>4}  {:>10}  {:>10}", "Zoom", "Tiles", "Size");
            for zoom in &stats {
                println!(
                    "  {:>4}  {:>10}  {:>10}",
                    zoom.zoom,
                    zoom.entries,
                    format_size(zoom.bytes)
                );
            }
            let entries: u64 = stats.iter().map(|z| z.entries).sum();
            let bytes: u64 = stats.iter().map(|z| z.bytes).sum();
            println!("  {:>4}  {:>10}  {:>10}", "all", entries, format_size(bytes));
            Ok(())
        }
        CacheAction::ClearZoom { zoom } => {
            if zoom > MAX_ZOOM {
                return Err(CliError::InvalidArgument(format!(
                    "zoom {} is deeper than the maximum of {}",
                    zoom, MAX_ZOOM
                )));
            }

            let store = TileCacheStore::open(cache_dir)?;
            let removed = store.delete_zoom_level(zoom)?;
            println!("Deleted {} tiles of zoom {}", removed, zoom);
            Ok(())
        }
    }
}

/// Human-readable byte count (binary units).
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
