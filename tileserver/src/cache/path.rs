//! Cache path construction and filename handling.

use crate::coord::TileCoord;
use std::path::{Path, PathBuf};

/// File extension of a cache entry.
pub const TILE_EXTENSION: &str = "png";

/// Extension appended to in-progress writes.
pub const TEMP_EXTENSION: &str = "tmp";

/// Construct the full path for a cached tile.
///
/// Creates a hierarchical path structure:
/// ```text
/// <cache_dir>/<zoom>/<x>/<y>.png
/// ```
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use tileserver::cache::tile_path;
/// use tileserver::coord::TileCoord;
///
/// let path = tile_path(&PathBuf::from("/cache"), &TileCoord::new(12, 2200, 1343));
/// assert_eq!(path, PathBuf::from("/cache/12/2200/1343.png"));
/// ```
pub fn tile_path(cache_dir: &Path, tile: &TileCoord) -> PathBuf {
    column_directory(cache_dir, tile).join(format!("{}.{}", tile.y, TILE_EXTENSION))
}

/// Get the directory holding every row of one column.
///
/// ```
/// use std::path::PathBuf;
/// use tileserver::cache::column_directory;
/// use tileserver::coord::TileCoord;
///
/// let dir = column_directory(&PathBuf::from("/cache"), &TileCoord::new(12, 2200, 1343));
/// assert_eq!(dir, PathBuf::from("/cache/12/2200"));
/// ```
pub fn column_directory(cache_dir: &Path, tile: &TileCoord) -> PathBuf {
    zoom_directory(cache_dir, tile.zoom).join(tile.x.to_string())
}

/// Get the directory holding an entire zoom level.
pub fn zoom_directory(cache_dir: &Path, zoom: u8) -> PathBuf {
    cache_dir.join(zoom.to_string())
}

/// Recover the tile coordinate from a path below `cache_dir`.
///
/// Returns `None` for anything that does not follow the
/// `<zoom>/<x>/<y>.png` layout, including temporary files.
pub fn parse_tile_path(cache_dir: &Path, path: &Path) -> Option<TileCoord> {
    let relative = path.strip_prefix(cache_dir).ok()?;
    let mut components = relative.components();

    let zoom = components.next()?.as_os_str().to_str()?.parse().ok()?;
    let x = components.next()?.as_os_str().to_str()?.parse().ok()?;
    let leaf = components.next()?.as_os_str().to_str()?;
    if components.next().is_some() {
        return None;
    }

    let y = leaf
        .strip_suffix(TILE_EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()?;

    Some(TileCoord::new(zoom, x, y))
}

/// Build a unique temporary sibling for an entry being written.
pub(crate) fn temp_path(final_path: &Path, sequence: u64) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(
        ".{}.{}.{}",
        std::process::id(),
        sequence,
        TEMP_EXTENSION
    ));
    final_path.with_file_name(name)
}
