//! File-system backed tile store.
//!
//! Every rendered tile lives at `<root>/<zoom>/<x>/<y>.png`. Writes go to a
//! uniquely named temporary sibling first and are renamed into place, so a
//! concurrent reader either sees the complete previous entry, the complete
//! new entry, or nothing at all.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use super::error::CacheError;
use super::path::{parse_tile_path, temp_path, tile_path, zoom_directory};
use crate::coord::TileCoord;

/// Name of the file written to prove the cache root is writable.
const WRITE_PROBE_FILENAME: &str = ".write-probe";

/// A persisted tile together with its storage metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub tile: TileCoord,
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

/// Any file found under the cache root, entry or not.
#[derive(Debug, Clone)]
pub(crate) struct StoredFile {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

/// Per-zoom totals reported by [`TileCacheStore::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoomStats {
    pub zoom: u8,
    pub entries: u64,
    pub bytes: u64,
}

/// Exclusive owner of an on-disk tile tree.
#[derive(Debug)]
pub struct TileCacheStore {
    root: PathBuf,
    sequence: AtomicU64,
}

impl TileCacheStore {
    /// Open a writable store, creating the root directory if needed.
    ///
    /// Writes and removes a probe file so an unwritable cache is reported
    /// here rather than on the first render.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotWritable`] if the root cannot be created or
    /// written to.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();

        fs::create_dir_all(&root).map_err(|source| CacheError::NotWritable {
            path: root.clone(),
            source,
        })?;

        let probe = root.join(WRITE_PROBE_FILENAME);
        fs::write(&probe, b"probe")
            .and_then(|_| fs::remove_file(&probe))
            .map_err(|source| CacheError::NotWritable {
                path: root.clone(),
                source,
            })?;

        debug!(dir = %root.display(), "Tile cache store opened");
        Ok(Self::at(root))
    }

    /// Attach to a tree without checking it exists or is writable.
    ///
    /// Used for read-mostly trees such as a prerendered tile directory.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Root directory of the tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic location of a tile's entry.
    pub fn path_for(&self, tile: &TileCoord) -> PathBuf {
        tile_path(&self.root, tile)
    }

    /// Read a tile. A missing entry is `Ok(None)`, not an error.
    pub fn get(&self, tile: &TileCoord) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_for(tile);
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Store a tile, replacing any previous entry.
    ///
    /// The bytes are fully written to a temporary sibling before being
    /// renamed onto the final path.
    pub fn put(&self, tile: &TileCoord, data: &[u8]) -> Result<(), CacheError> {
        let path = self.path_for(tile);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let temp = temp_path(&path, self.sequence.fetch_add(1, Ordering::Relaxed));
        let written = Self::write_file(&temp, data).and_then(|_| fs::rename(&temp, &path));

        if let Err(source) = written {
            let _ = fs::remove_file(&temp);
            return Err(CacheError::Io { path, source });
        }
        Ok(())
    }

    fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(data)?;
        file.sync_all()
    }

    /// Whether an entry exists for the tile.
    pub fn exists(&self, tile: &TileCoord) -> bool {
        self.path_for(tile).is_file()
    }

    /// Last modification time of a tile's entry.
    pub fn modified(&self, tile: &TileCoord) -> Result<Option<SystemTime>, CacheError> {
        let path = self.path_for(tile);
        match fs::metadata(&path) {
            Ok(metadata) => metadata
                .modified()
                .map(Some)
                .map_err(|source| CacheError::Io { path, source }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Age of a tile's entry relative to now.
    pub fn age(&self, tile: &TileCoord) -> Result<Option<Duration>, CacheError> {
        self.age_at(tile, SystemTime::now())
    }

    /// Age of a tile's entry relative to `now`.
    ///
    /// Entries stamped in the future report an age of zero.
    pub fn age_at(
        &self,
        tile: &TileCoord,
        now: SystemTime,
    ) -> Result<Option<Duration>, CacheError> {
        Ok(self
            .modified(tile)?
            .map(|modified| now.duration_since(modified).unwrap_or_default()))
    }

    /// Remove a tile's entry. Returns whether it existed.
    pub fn delete(&self, tile: &TileCoord) -> Result<bool, CacheError> {
        let path = self.path_for(tile);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Remove every entry of a zoom level with a single directory removal.
    ///
    /// Returns the number of entries that were removed.
    pub fn delete_zoom_level(&self, zoom: u8) -> Result<usize, CacheError> {
        let dir = zoom_directory(&self.root, zoom);
        if !dir.is_dir() {
            return Ok(0);
        }

        let mut files = Vec::new();
        collect_files_recursive(&dir, &mut files);
        let removed = files
            .iter()
            .filter(|f| parse_tile_path(&self.root, &f.path).is_some())
            .count();

        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(removed),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(source) => Err(CacheError::Io { path: dir, source }),
        }
    }

    /// Zoom levels that currently have a directory in the tree, ascending.
    pub fn zoom_levels(&self) -> Result<Vec<u8>, CacheError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut zooms: Vec<u8> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().and_then(|n| n.parse().ok()))
            .collect();
        zooms.sort_unstable();
        Ok(zooms)
    }

    /// Every well-formed entry in the tree.
    pub fn entries(&self) -> Vec<CacheEntry> {
        self.files()
            .into_iter()
            .filter_map(|file| {
                parse_tile_path(&self.root, &file.path).map(|tile| CacheEntry {
                    tile,
                    path: file.path,
                    modified: file.modified,
                    size: file.size,
                })
            })
            .collect()
    }

    /// Entry counts and sizes grouped by zoom level, ascending.
    pub fn stats(&self) -> Vec<ZoomStats> {
        let mut by_zoom = std::collections::BTreeMap::<u8, ZoomStats>::new();
        for entry in self.entries() {
            let stats = by_zoom.entry(entry.tile.zoom).or_insert(ZoomStats {
                zoom: entry.tile.zoom,
                ..Default::default()
            });
            stats.entries += 1;
            stats.bytes += entry.size;
        }
        by_zoom.into_values().collect()
    }

    /// Every regular file in the tree, including stray temporaries.
    pub(crate) fn files(&self) -> Vec<StoredFile> {
        let mut files = Vec::new();
        collect_files_recursive(&self.root, &mut files);
        files
    }

    /// Remove directories emptied by deletions. The root itself is kept.
    pub fn prune_empty_dirs(&self) {
        cleanup_empty_dirs(&self.root);
    }
}

/// Recursively collect files from a directory.
fn collect_files_recursive(dir: &Path, files: &mut Vec<StoredFile>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(
                dir = %dir.display(),
                error = %e,
                "Failed to read directory during cache scan"
            );
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if let Ok(metadata) = entry.metadata() {
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push(StoredFile {
                path,
                modified,
                size: metadata.len(),
            });
        } else {
            warn!(path = %path.display(), "Could not stat cache file");
        }
    }
}

/// Remove empty directories below `dir`.
fn cleanup_empty_dirs(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            cleanup_empty_dirs(&path);
            // fails silently if not empty
            let _ = fs::remove_dir(&path);
        }
    }
}
