//! Map data and theme discovery.
//!
//! The renderer consumes vector map files (`*.map`) from a data directory and
//! a style theme file. Both are checked once at startup; the scheduler asks
//! for the newest map modification time before every cycle to decide whether
//! prerendering would be wasted work.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use glob::MatchOptions;
use thiserror::Error;
use tracing::{debug, info};

/// File extension of vector map data files.
pub const MAP_EXTENSION: &str = "map";

/// Errors raised while discovering map data or the theme.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("Map data directory {} is not readable: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("No .{MAP_EXTENSION} files found in {}", path.display())]
    NoMapFiles { path: PathBuf },

    #[error("Theme file {} is missing or not a file", path.display())]
    ThemeMissing { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The set of map files backing the renderer.
#[derive(Debug, Clone)]
pub struct MapDataSet {
    directory: PathBuf,
    files: Vec<PathBuf>,
}

impl MapDataSet {
    /// Scan `directory` for map files.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be read or holds no map file.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, MapError> {
        let directory = directory.into();
        let files = scan_map_files(&directory)?;
        if files.is_empty() {
            return Err(MapError::NoMapFiles { path: directory });
        }

        info!(
            dir = %directory.display(),
            count = files.len(),
            "Map data discovered"
        );
        Ok(Self { directory, files })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Map files found at open time, sorted by path.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Newest modification time across the map files currently on disk.
    ///
    /// Rescans the directory so replaced or newly added files are seen.
    pub fn newest_modification(&self) -> Result<SystemTime, MapError> {
        let files = scan_map_files(&self.directory)?;
        let mut newest: Option<SystemTime> = None;

        for file in &files {
            let modified = fs::metadata(file)
                .and_then(|m| m.modified())
                .map_err(|source| MapError::Io {
                    path: file.clone(),
                    source,
                })?;
            newest = Some(newest.map_or(modified, |n| n.max(modified)));
        }

        newest.ok_or_else(|| MapError::NoMapFiles {
            path: self.directory.clone(),
        })
    }
}

fn scan_map_files(directory: &Path) -> Result<Vec<PathBuf>, MapError> {
    if !directory.is_dir() {
        return Err(MapError::Unreadable {
            path: directory.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let pattern = format!(
        "{}/*.{}",
        glob::Pattern::escape(&directory.to_string_lossy()),
        MAP_EXTENSION
    );
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let paths = glob::glob_with(&pattern, options).map_err(|e| MapError::Unreadable {
        path: directory.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = paths.flatten().filter(|p| p.is_file()).collect();
    files.sort();
    debug!(dir = %directory.display(), count = files.len(), "Scanned map directory");
    Ok(files)
}

/// Check that the style theme exists and is a regular file.
pub fn validate_theme(path: &Path) -> Result<(), MapError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(MapError::ThemeMissing {
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_open_finds_map_files_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("germany.map"), b"m").unwrap();
        fs::write(temp_dir.path().join("WORLD.MAP"), b"m").unwrap();
        fs::write(temp_dir.path().join("readme.txt"), b"t").unwrap();

        let maps = MapDataSet::open(temp_dir.path()).unwrap();
        assert_eq!(maps.files().len(), 2);
        assert_eq!(maps.directory(), temp_dir.path());
    }

    #[test]
    fn test_open_empty_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            MapDataSet::open(temp_dir.path()),
            Err(MapError::NoMapFiles { .. })
        ));
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            MapDataSet::open(temp_dir.path().join("absent")),
            Err(MapError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_newest_modification() {
        let temp_dir = TempDir::new().unwrap();
        let older = temp_dir.path().join("a.map");
        let newer = temp_dir.path().join("b.map");
        fs::write(&older, b"a").unwrap();
        fs::write(&newer, b"b").unwrap();

        let base = SystemTime::now() - Duration::from_secs(86_400);
        filetime::set_file_mtime(&older, FileTime::from_system_time(base)).unwrap();
        let newest = base + Duration::from_secs(3600);
        filetime::set_file_mtime(&newer, FileTime::from_system_time(newest)).unwrap();

        let maps = MapDataSet::open(temp_dir.path()).unwrap();
        let reported = maps.newest_modification().unwrap();
        let drift = reported
            .duration_since(newest)
            .unwrap_or_else(|e| e.duration());
        assert!(drift < Duration::from_secs(1));
    }

    #[test]
    fn test_validate_theme() {
        let temp_dir = TempDir::new().unwrap();
        let theme = temp_dir.path().join("theme.xml");
        assert!(validate_theme(&theme).is_err());
        fs::write(&theme, b"<rendertheme/>").unwrap();
        assert!(validate_theme(&theme).is_ok());
        assert!(validate_theme(temp_dir.path()).is_err());
    }
}
