//! Staleness policies for the tile cache.
//!
//! Exactly one policy is active per deployment. The scheduler runs its sweep
//! before every prerender cycle; the `cache sweep` command runs it on demand.

use std::fmt;
use std::fs;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, info, warn};

use super::error::CacheError;
use super::store::TileCacheStore;

/// Default age horizon: two weeks.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Default prerender ceiling for the zoom policy.
pub const DEFAULT_ZOOM_CEILING: u8 = 12;

/// Decides which cache entries are invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalenessPolicy {
    /// Entries whose age strictly exceeds the horizon are stale.
    MaxAge(Duration),
    /// Every entry deeper than the ceiling is stale.
    ZoomCeiling(u8),
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        StalenessPolicy::MaxAge(DEFAULT_MAX_AGE)
    }
}

impl fmt::Display for StalenessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StalenessPolicy::MaxAge(max_age) => write!(f, "max age {}s", max_age.as_secs()),
            StalenessPolicy::ZoomCeiling(ceiling) => write!(f, "zoom ceiling {}", ceiling),
        }
    }
}

/// Outcome of one staleness sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepResult {
    /// Number of files removed.
    pub entries_removed: usize,
    /// Duration of the sweep in milliseconds.
    pub duration_ms: u64,
}

impl fmt::Display for SweepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sweep: removed {} entries in {}ms",
            self.entries_removed, self.duration_ms
        )
    }
}

impl StalenessPolicy {
    /// Delete every stale entry in the store, measured against `now`.
    ///
    /// Individual files that cannot be removed are logged and skipped.
    pub fn sweep(&self, store: &TileCacheStore, now: SystemTime) -> Result<SweepResult, CacheError> {
        let start = Instant::now();

        let entries_removed = match *self {
            StalenessPolicy::MaxAge(max_age) => sweep_by_age(store, max_age, now),
            StalenessPolicy::ZoomCeiling(ceiling) => sweep_by_zoom(store, ceiling)?,
        };

        let result = SweepResult {
            entries_removed,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            policy = %self,
            removed = result.entries_removed,
            duration_ms = result.duration_ms,
            "Staleness sweep complete"
        );

        Ok(result)
    }
}

/// Modification times in the future count as fresh.
fn older_than(modified: SystemTime, max_age: Duration, now: SystemTime) -> bool {
    now.duration_since(modified)
        .map(|age| age > max_age)
        .unwrap_or(false)
}

fn sweep_by_age(store: &TileCacheStore, max_age: Duration, now: SystemTime) -> usize {
    let mut removed = 0;

    // stray temporaries age out with the entries
    for file in store.files() {
        if !older_than(file.modified, max_age, now) {
            continue;
        }

        match fs::remove_file(&file.path) {
            Ok(()) => {
                debug!(path = %file.path.display(), "Removed stale cache file");
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "Failed to remove stale cache file");
            }
        }
    }

    if removed > 0 {
        store.prune_empty_dirs();
    }
    removed
}

fn sweep_by_zoom(store: &TileCacheStore, ceiling: u8) -> Result<usize, CacheError> {
    let mut removed = 0;
    for zoom in store.zoom_levels()? {
        if zoom <= ceiling {
            continue;
        }
        match store.delete_zoom_level(zoom) {
            Ok(count) => {
                debug!(zoom, count, "Removed zoom level above ceiling");
                removed += count;
            }
            Err(e) => warn!(zoom, error = %e, "Failed to remove zoom level"),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use filetime::FileTime;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, TileCacheStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = TileCacheStore::open(temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    fn stamp(store: &TileCacheStore, tile: &TileCoord, at: SystemTime) {
        filetime::set_file_mtime(store.path_for(tile), FileTime::from_system_time(at)).unwrap();
    }

    #[test]
    fn test_age_sweep_boundary() {
        let (_temp_dir, store) = create_test_store();
        let max_age = Duration::from_secs(3600);
        let now = SystemTime::now();

        let old = TileCoord::new(10, 1, 1);
        let young = TileCoord::new(10, 1, 2);
        store.put(&old, b"old").unwrap();
        store.put(&young, b"young").unwrap();
        stamp(&store, &old, now - max_age - Duration::from_secs(1));
        stamp(&store, &young, now - max_age + Duration::from_secs(1));

        let result = StalenessPolicy::MaxAge(max_age).sweep(&store, now).unwrap();

        assert_eq!(result.entries_removed, 1);
        assert!(!store.exists(&old));
        assert!(store.exists(&young));
    }

    #[test]
    fn test_age_sweep_removes_old_temporaries() {
        let (_temp_dir, store) = create_test_store();
        let max_age = Duration::from_secs(60);
        let now = SystemTime::now();

        let tile = TileCoord::new(3, 1, 1);
        store.put(&tile, b"x").unwrap();
        let stray = store.path_for(&tile).with_file_name("1.png.999.0.tmp");
        fs::write(&stray, b"partial").unwrap();
        filetime::set_file_mtime(
            &stray,
            FileTime::from_system_time(now - Duration::from_secs(600)),
        )
        .unwrap();

        let result = StalenessPolicy::MaxAge(max_age).sweep(&store, now).unwrap();

        assert_eq!(result.entries_removed, 1);
        assert!(!stray.exists());
        assert!(store.exists(&tile));
    }

    #[test]
    fn test_age_sweep_prunes_emptied_directories() {
        let (_temp_dir, store) = create_test_store();
        let now = SystemTime::now();
        let tile = TileCoord::new(9, 200, 100);
        store.put(&tile, b"x").unwrap();
        stamp(&store, &tile, now - Duration::from_secs(7200));

        StalenessPolicy::MaxAge(Duration::from_secs(3600))
            .sweep(&store, now)
            .unwrap();

        assert!(!store.root().join("9").exists());
        assert!(store.root().is_dir());
    }

    #[test]
    fn test_zoom_ceiling_sweep() {
        let (_temp_dir, store) = create_test_store();
        for zoom in [5u8, 12, 13, 20] {
            store.put(&TileCoord::new(zoom, 0, 0), &[zoom]).unwrap();
        }

        let result = StalenessPolicy::ZoomCeiling(12)
            .sweep(&store, SystemTime::now())
            .unwrap();

        assert_eq!(result.entries_removed, 2);
        assert!(store.exists(&TileCoord::new(5, 0, 0)));
        assert!(store.exists(&TileCoord::new(12, 0, 0)));
        assert!(!store.exists(&TileCoord::new(13, 0, 0)));
        assert!(!store.exists(&TileCoord::new(20, 0, 0)));
        assert_eq!(store.zoom_levels().unwrap(), vec![5, 12]);
    }

    #[test]
    fn test_sweep_on_empty_store() {
        let (_temp_dir, store) = create_test_store();
        let now = SystemTime::now();
        assert_eq!(
            StalenessPolicy::default().sweep(&store, now).unwrap().entries_removed,
            0
        );
        assert_eq!(
            StalenessPolicy::ZoomCeiling(0)
                .sweep(&store, now)
                .unwrap()
                .entries_removed,
            0
        );
    }

    #[test]
    fn test_age_sweep_keeps_future_timestamps() {
        let (_temp_dir, store) = create_test_store();
        let now = SystemTime::now();
        let future = TileCoord::new(3, 1, 1);
        let past = TileCoord::new(3, 2, 2);
        store.put(&future, b"x").unwrap();
        store.put(&past, b"x").unwrap();
        stamp(&store, &future, now + Duration::from_secs(60));
        stamp(&store, &past, now - Duration::from_secs(1));

        let result = StalenessPolicy::MaxAge(Duration::ZERO).sweep(&store, now).unwrap();

        assert_eq!(result.entries_removed, 1);
        assert!(store.exists(&future));
        assert!(!store.exists(&past));
    }

    #[test]
    fn test_policy_display() {
        assert_eq!(
            StalenessPolicy::MaxAge(Duration::from_secs(60)).to_string(),
            "max age 60s"
        );
        assert_eq!(StalenessPolicy::ZoomCeiling(12).to_string(), "zoom ceiling 12");
    }
}
