//! The recurring prerender cycle.
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌─────────────┐   ┌───────┐
//! │ staleness    │──►│ global band │──►│ named areas │──►│ sleep │──┐
//! │ sweep        │   │ z0..=global │   │ z7..=max    │   │       │  │
//! └──────────────┘   └─────────────┘   └─────────────┘   └───────┘  │
//!        ▲                                                          │
//!        └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Cancellation interrupts the sleep immediately. Between phases the token
//! is checked and the rest of the cycle is skipped, but a running fan-out
//! always completes.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fanout::{FanOutReport, ParallelZoomFanOut};
use super::region::{global_band, PrerenderArea};
use crate::cache::{StalenessPolicy, SweepResult};
use crate::coord::TileCoord;
use crate::map::MapDataSet;
use crate::service::TileService;

/// Tile whose modification time marks the last completed prerender.
pub const SENTINEL_TILE: TileCoord = TileCoord::new(0, 0, 0);

/// Deepest zoom of the global band.
pub const DEFAULT_GLOBAL_MAX_ZOOM: u8 = 6;

/// Pause between cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);

/// Everything the scheduler needs to know about one deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct PrerenderConfig {
    pub global_max_zoom: u8,
    pub areas: Vec<PrerenderArea>,
    pub interval: Duration,
    pub staleness: StalenessPolicy,
    /// Skip a cycle when no map file is newer than the sentinel tile.
    pub skip_unchanged: bool,
    /// Stop after one cycle instead of sleeping.
    pub run_once: bool,
}

impl Default for PrerenderConfig {
    fn default() -> Self {
        Self {
            global_max_zoom: DEFAULT_GLOBAL_MAX_ZOOM,
            areas: vec![PrerenderArea::germany()],
            interval: DEFAULT_INTERVAL,
            staleness: StalenessPolicy::default(),
            skip_unchanged: false,
            run_once: false,
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// The map data was unchanged and nothing ran.
    pub skipped: bool,
    /// Shutdown was requested between phases.
    pub interrupted: bool,
    pub swept: Option<SweepResult>,
    pub global: Option<FanOutReport>,
    pub areas: Vec<(String, FanOutReport)>,
}

impl CycleReport {
    pub fn rendered(&self) -> u64 {
        self.global.as_ref().map_or(0, |r| r.rendered())
            + self.areas.iter().map(|(_, r)| r.rendered()).sum::<u64>()
    }

    pub fn failed(&self) -> u64 {
        self.global.as_ref().map_or(0, |r| r.failed())
            + self.areas.iter().map(|(_, r)| r.failed()).sum::<u64>()
    }
}

/// Runs prerender cycles against one [`TileService`].
pub struct PrerenderScheduler {
    service: Arc<TileService>,
    fanout: ParallelZoomFanOut,
    config: PrerenderConfig,
    source: Option<Arc<MapDataSet>>,
}

impl PrerenderScheduler {
    /// Create a scheduler. `source` is only consulted when
    /// `config.skip_unchanged` is set.
    pub fn new(
        service: Arc<TileService>,
        config: PrerenderConfig,
        source: Option<Arc<MapDataSet>>,
    ) -> Self {
        Self {
            fanout: ParallelZoomFanOut::new(Arc::clone(&service)),
            service,
            config,
            source,
        }
    }

    pub fn config(&self) -> &PrerenderConfig {
        &self.config
    }

    /// Run cycles until cancelled, or once when `run_once` is set.
    ///
    /// Returns the number of cycles that ran (skipped ones included).
    pub async fn run(&self, shutdown: CancellationToken) -> u64 {
        let mut cycles = 0;

        info!(
            interval_secs = self.config.interval.as_secs(),
            areas = self.config.areas.len(),
            staleness = %self.config.staleness,
            "Prerender scheduler started"
        );

        while !shutdown.is_cancelled() {
            let report = self.run_cycle(&shutdown).await;
            cycles += 1;

            if report.interrupted || self.config.run_once {
                break;
            }

            debug!(interval_secs = self.config.interval.as_secs(), "Sleeping until next cycle");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        info!(cycles, "Prerender scheduler stopped");
        cycles
    }

    /// Run one cycle: sweep, global band, then every named area.
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> CycleReport {
        let mut report = CycleReport::default();

        if self.source_unchanged().await {
            info!("Map data unchanged since last prerender, skipping cycle");
            report.skipped = true;
            return report;
        }

        report.swept = self.sweep().await;

        if shutdown.is_cancelled() {
            report.interrupted = true;
            return report;
        }

        info!(max_zoom = self.config.global_max_zoom, "Prerendering global band");
        let global = self.fanout.run(&global_band(self.config.global_max_zoom)).await;
        info!(report = %global, "Global band done");
        report.global = Some(global);

        for area in &self.config.areas {
            if shutdown.is_cancelled() {
                report.interrupted = true;
                return report;
            }

            info!(area = %area, "Prerendering area");
            let area_report = self.fanout.run(&area.plan()).await;
            info!(area = %area.name, report = %area_report, "Area done");
            report.areas.push((area.name.clone(), area_report));
        }

        if self.config.skip_unchanged {
            self.refresh_sentinel().await;
        }

        info!(
            rendered = report.rendered(),
            failed = report.failed(),
            "Prerender cycle complete"
        );
        report
    }

    /// Rewrite the sentinel tile so its mtime marks this cycle's completion.
    async fn refresh_sentinel(&self) {
        let service = Arc::clone(&self.service);
        match tokio::task::spawn_blocking(move || service.render_and_store(&SENTINEL_TILE)).await {
            Ok(Ok(Some(_))) => debug!("Sentinel tile refreshed"),
            Ok(Ok(None)) => warn!("Renderer does not support the sentinel tile"),
            Ok(Err(e)) => warn!(error = %e, "Failed to refresh sentinel tile"),
            Err(e) => warn!(error = %e, "Sentinel refresh task failed"),
        }
    }

    async fn sweep(&self) -> Option<SweepResult> {
        let store = Arc::clone(self.service.store());
        let policy = self.config.staleness;

        match tokio::task::spawn_blocking(move || policy.sweep(&store, SystemTime::now())).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(e)) => {
                warn!(error = %e, "Staleness sweep failed");
                None
            }
            Err(e) => {
                warn!(error = %e, "Staleness sweep task failed");
                None
            }
        }
    }

    /// Whether the sentinel tile is newer than every map file.
    async fn source_unchanged(&self) -> bool {
        if !self.config.skip_unchanged {
            return false;
        }
        let Some(source) = self.source.clone() else {
            return false;
        };
        let store = Arc::clone(self.service.store());

        let check = tokio::task::spawn_blocking(move || {
            let newest_map = source.newest_modification()?;
            let sentinel = store.modified(&SENTINEL_TILE)?;
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>((newest_map, sentinel))
        })
        .await;

        match check {
            Ok(Ok((newest_map, Some(sentinel)))) => {
                debug!(?newest_map, ?sentinel, "Compared map data with sentinel tile");
                newest_map < sentinel
            }
            Ok(Ok((_, None))) => false,
            Ok(Err(e)) => {
                warn!(error = %e, "Could not compare map data with sentinel tile");
                false
            }
            Err(e) => {
                warn!(error = %e, "Sentinel check task failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TileCacheStore;
    use crate::coord::TileRect;
    use crate::render::{RenderError, RenderOutput, Renderer};
    use filetime::FileTime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl Renderer for CountingRenderer {
        fn render(&self, tile: &TileCoord) -> Result<RenderOutput, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RenderOutput::Raster(tile.to_string().into_bytes()))
        }
    }

    struct Fixture {
        _temp_dir: TempDir,
        maps: Arc<MapDataSet>,
        renderer: Arc<CountingRenderer>,
        service: Arc<TileService>,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let map_dir = temp_dir.path().join("maps");
        std::fs::create_dir_all(&map_dir).unwrap();
        std::fs::write(map_dir.join("region.map"), b"map").unwrap();

        let store = Arc::new(TileCacheStore::open(temp_dir.path().join("cache")).unwrap());
        let renderer = Arc::new(CountingRenderer::default());
        let service = Arc::new(TileService::new(store, renderer.clone()));
        Fixture {
            maps: Arc::new(MapDataSet::open(map_dir).unwrap()),
            _temp_dir: temp_dir,
            renderer,
            service,
        }
    }

    fn small_config() -> PrerenderConfig {
        PrerenderConfig {
            global_max_zoom: 1,
            areas: vec![PrerenderArea::new("corner", TileRect::new(0, 0, 0, 0), 8)],
            interval: Duration::from_secs(3600),
            ..Default::default()
        }
    }

    fn set_map_mtime(fixture: &Fixture, at: SystemTime) {
        filetime::set_file_mtime(&fixture.maps.files()[0], FileTime::from_system_time(at))
            .unwrap();
    }

    #[tokio::test]
    async fn test_cycle_runs_all_phases() {
        let fixture = fixture();
        let scheduler = PrerenderScheduler::new(fixture.service.clone(), small_config(), None);

        let report = scheduler.run_cycle(&CancellationToken::new()).await;

        assert!(!report.skipped);
        assert!(report.swept.is_some());
        // zoom 0..=1 globally, zoom 7..=8 for the area
        assert_eq!(report.global.as_ref().unwrap().rendered(), 5);
        assert_eq!(report.areas.len(), 1);
        assert_eq!(report.areas[0].1.rendered(), 5);
        assert_eq!(fixture.renderer.calls.load(Ordering::SeqCst), 10);
        assert!(fixture.service.store().exists(&TileCoord::new(8, 1, 1)));
    }

    #[tokio::test]
    async fn test_sweep_runs_before_prerender() {
        let fixture = fixture();
        let config = PrerenderConfig {
            staleness: StalenessPolicy::ZoomCeiling(6),
            ..small_config()
        };
        fixture
            .service
            .store()
            .put(&TileCoord::new(15, 1, 1), b"deep")
            .unwrap();
        let scheduler = PrerenderScheduler::new(fixture.service.clone(), config, None);

        let report = scheduler.run_cycle(&CancellationToken::new()).await;

        assert_eq!(report.swept.unwrap().entries_removed, 1);
        assert!(!fixture.service.store().exists(&TileCoord::new(15, 1, 1)));
    }

    #[tokio::test]
    async fn test_unchanged_source_skips_cycle() {
        let fixture = fixture();
        let config = PrerenderConfig {
            skip_unchanged: true,
            ..small_config()
        };
        fixture.service.store().put(&SENTINEL_TILE, b"old").unwrap();
        set_map_mtime(&fixture, SystemTime::now() - Duration::from_secs(86_400));

        let scheduler =
            PrerenderScheduler::new(fixture.service.clone(), config, Some(fixture.maps.clone()));
        let report = scheduler.run_cycle(&CancellationToken::new()).await;

        assert!(report.skipped);
        assert!(report.swept.is_none());
        assert_eq!(fixture.renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_newer_source_runs_cycle() {
        let fixture = fixture();
        let config = PrerenderConfig {
            skip_unchanged: true,
            ..small_config()
        };
        fixture.service.store().put(&SENTINEL_TILE, b"old").unwrap();
        set_map_mtime(&fixture, SystemTime::now() + Duration::from_secs(60));

        let scheduler =
            PrerenderScheduler::new(fixture.service.clone(), config, Some(fixture.maps.clone()));
        let report = scheduler.run_cycle(&CancellationToken::new()).await;

        assert!(!report.skipped);
        assert!(fixture.renderer.calls.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn test_changed_source_refreshes_sentinel() {
        let fixture = fixture();
        let config = PrerenderConfig {
            skip_unchanged: true,
            staleness: StalenessPolicy::ZoomCeiling(12),
            ..small_config()
        };
        let now = SystemTime::now();
        let store = fixture.service.store();
        store.put(&SENTINEL_TILE, b"old").unwrap();
        filetime::set_file_mtime(
            store.path_for(&SENTINEL_TILE),
            FileTime::from_system_time(now - Duration::from_secs(7200)),
        )
        .unwrap();
        set_map_mtime(&fixture, now - Duration::from_secs(3600));

        let scheduler =
            PrerenderScheduler::new(fixture.service.clone(), config, Some(fixture.maps.clone()));
        let first = scheduler.run_cycle(&CancellationToken::new()).await;
        assert!(!first.skipped);
        assert_eq!(store.get(&SENTINEL_TILE).unwrap(), Some(b"0/0/0".to_vec()));

        let calls = fixture.renderer.calls.load(Ordering::SeqCst);
        let second = scheduler.run_cycle(&CancellationToken::new()).await;
        assert!(second.skipped);
        assert_eq!(fixture.renderer.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_cancelled_token_ends_cycle_after_sweep() {
        let fixture = fixture();
        let scheduler = PrerenderScheduler::new(fixture.service.clone(), small_config(), None);
        let token = CancellationToken::new();
        token.cancel();

        let report = scheduler.run_cycle(&token).await;

        assert!(report.interrupted);
        assert!(report.global.is_none());
        assert_eq!(fixture.renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_once_terminates() {
        let fixture = fixture();
        let config = PrerenderConfig {
            run_once: true,
            ..small_config()
        };
        let scheduler = PrerenderScheduler::new(fixture.service.clone(), config, None);

        let cycles = tokio::time::timeout(
            Duration::from_secs(30),
            scheduler.run(CancellationToken::new()),
        )
        .await
        .expect("run_once should return");

        assert_eq!(cycles, 1);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_sleep() {
        let fixture = fixture();
        let scheduler = Arc::new(PrerenderScheduler::new(
            fixture.service.clone(),
            small_config(),
            None,
        ));
        let token = CancellationToken::new();

        let handle = {
            let scheduler = Arc::clone(&scheduler);
            let token = token.clone();
            tokio::spawn(async move { scheduler.run(token).await })
        };

        // wait for the first cycle to finish its area
        let deepest = TileCoord::new(8, 1, 1);
        for _ in 0..300 {
            if fixture.service.store().exists(&deepest) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        token.cancel();

        let cycles = tokio::time::timeout(Duration::from_secs(30), handle)
            .await
            .expect("scheduler should stop")
            .unwrap();
        assert_eq!(cycles, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let fixture = fixture();
        let scheduler = PrerenderScheduler::new(fixture.service.clone(), small_config(), None);
        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(scheduler.run(token).await, 0);
    }
}
