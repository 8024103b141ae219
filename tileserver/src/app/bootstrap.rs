//! Application bootstrap implementation.
//!
//! `TileServerApp` performs every fatal startup check before anything is
//! served or scheduled, then hands out the shared, immutable-after-init
//! service objects to the front ends and the scheduler.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::config::AppConfig;
use super::error::AppError;
use crate::cache::TileCacheStore;
use crate::frontend::{FileQueueWorker, SocketFrontEnd};
use crate::map::{validate_theme, MapDataSet};
use crate::prerender::{PrerenderConfig, PrerenderScheduler};
use crate::render::{PreviewRenderer, Renderer};
use crate::service::TileService;

/// The tile server with its startup checks done.
///
/// Startup order:
/// 1. Cache directory created and write-probed
/// 2. Map data directory scanned (at least one `*.map`)
/// 3. Theme file checked
/// 4. Renderer and [`TileService`] built
pub struct TileServerApp {
    service: Arc<TileService>,
    maps: Arc<MapDataSet>,
    prerendered: Option<Arc<TileCacheStore>>,
    config: AppConfig,
}

impl TileServerApp {
    /// Start with the bundled [`PreviewRenderer`].
    ///
    /// # Errors
    ///
    /// Returns an error if any startup check fails.
    pub fn start(config: AppConfig) -> Result<Self, AppError> {
        let renderer = Arc::new(PreviewRenderer::new(config.coverage));
        Self::start_with_renderer(config, renderer)
    }

    /// Start with a caller-supplied renderer.
    pub fn start_with_renderer(
        config: AppConfig,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, AppError> {
        info!("Starting tile server");

        let store = Arc::new(TileCacheStore::open(&config.cache_directory)?);
        info!(directory = %config.cache_directory.display(), "Tile cache ready");

        let maps = Arc::new(MapDataSet::open(&config.map_directory)?);
        validate_theme(&config.theme_file)?;
        info!(
            maps = maps.files().len(),
            theme = %config.theme_file.display(),
            coverage = %config.coverage,
            "Map data ready"
        );

        let prerendered = config
            .prerendered_directory
            .as_ref()
            .map(|dir| Arc::new(TileCacheStore::at(dir)));

        Ok(Self {
            service: Arc::new(TileService::new(store, renderer)),
            maps,
            prerendered,
            config,
        })
    }

    pub fn service(&self) -> Arc<TileService> {
        Arc::clone(&self.service)
    }

    pub fn maps(&self) -> Arc<MapDataSet> {
        Arc::clone(&self.maps)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Scheduler sharing this app's service and map data.
    pub fn scheduler(&self, config: PrerenderConfig) -> PrerenderScheduler {
        PrerenderScheduler::new(self.service(), config, Some(self.maps()))
    }

    /// Socket front end consulting the prerendered tree first.
    pub fn socket_front_end(&self, workers: usize) -> SocketFrontEnd {
        SocketFrontEnd::new(self.service(), self.prerendered.clone(), workers)
    }

    /// File-queue worker writing into `output_directory`.
    ///
    /// Reuses the live cache when the directories match; otherwise the
    /// output tree is opened and write-probed like the cache.
    pub fn queue_worker(
        &self,
        output_directory: &Path,
        poll_timeout: Duration,
    ) -> Result<FileQueueWorker, AppError> {
        let service = if output_directory == self.service.store().root() {
            self.service()
        } else {
            let store = Arc::new(TileCacheStore::open(output_directory)?);
            info!(directory = %output_directory.display(), "Queue output store ready");
            Arc::new(TileService::new(store, Arc::clone(self.service.renderer())))
        };
        Ok(FileQueueWorker::new(service, poll_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use crate::service::TileLookup;
    use std::fs;
    use tempfile::TempDir;

    fn layout() -> (TempDir, AppConfig) {
        let temp_dir = TempDir::new().unwrap();
        let maps = temp_dir.path().join("maps");
        fs::create_dir_all(&maps).unwrap();
        fs::write(maps.join("germany.map"), b"map").unwrap();
        let theme = temp_dir.path().join("theme.xml");
        fs::write(&theme, b"<rendertheme/>").unwrap();

        let config = AppConfig::new(temp_dir.path().join("cache"), maps, theme);
        (temp_dir, config)
    }

    #[test]
    fn test_start_and_fetch() {
        let (_temp_dir, config) = layout();
        let app = TileServerApp::start(config).unwrap();

        let lookup = app.service().fetch(&TileCoord::new(0, 0, 0)).unwrap();
        assert!(matches!(lookup, TileLookup::Rendered(_)));
    }

    #[test]
    fn test_missing_map_data_is_fatal() {
        let (temp_dir, mut config) = layout();
        config.map_directory = temp_dir.path().join("empty");
        fs::create_dir_all(&config.map_directory).unwrap();

        assert!(matches!(
            TileServerApp::start(config),
            Err(AppError::MapData(_))
        ));
    }

    #[test]
    fn test_missing_theme_is_fatal() {
        let (temp_dir, mut config) = layout();
        config.theme_file = temp_dir.path().join("absent.xml");

        assert!(matches!(
            TileServerApp::start(config),
            Err(AppError::MapData(_))
        ));
    }

    #[test]
    fn test_unwritable_cache_is_fatal() {
        let (temp_dir, mut config) = layout();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        config.cache_directory = blocker.join("cache");

        assert!(matches!(
            TileServerApp::start(config),
            Err(AppError::Cache(_))
        ));
    }

    #[test]
    fn test_queue_worker_separate_output() {
        let (temp_dir, config) = layout();
        let app = TileServerApp::start(config).unwrap();
        let out = temp_dir.path().join("out");

        assert!(app.queue_worker(&out, Duration::from_secs(1)).is_ok());
        assert!(out.is_dir());
    }
}
