//! One worker per zoom level, joined before returning.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::region::ZoomRect;
use crate::service::{PrerenderOutcome, TileService};

/// Counts produced by one zoom-level worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoomReport {
    pub zoom: u8,
    pub rendered: u64,
    pub cached: u64,
    pub unsupported: u64,
    pub failed: u64,
    /// The worker panicked; tiles after the panic were not visited.
    pub aborted: bool,
}

impl ZoomReport {
    fn new(zoom: u8) -> Self {
        Self {
            zoom,
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: PrerenderOutcome) {
        match outcome {
            PrerenderOutcome::Rendered => self.rendered += 1,
            PrerenderOutcome::Cached => self.cached += 1,
            PrerenderOutcome::Unsupported => self.unsupported += 1,
        }
    }
}

/// Aggregated result of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Per-zoom reports, in plan order.
    pub zooms: Vec<ZoomReport>,
    pub duration_ms: u64,
}

impl FanOutReport {
    pub fn rendered(&self) -> u64 {
        self.zooms.iter().map(|z| z.rendered).sum()
    }

    pub fn cached(&self) -> u64 {
        self.zooms.iter().map(|z| z.cached).sum()
    }

    pub fn unsupported(&self) -> u64 {
        self.zooms.iter().map(|z| z.unsupported).sum()
    }

    pub fn failed(&self) -> u64 {
        self.zooms.iter().map(|z| z.failed).sum()
    }
}

impl fmt::Display for FanOutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} zoom levels: {} rendered, {} cached, {} unsupported, {} failed in {}ms",
            self.zooms.len(),
            self.rendered(),
            self.cached(),
            self.unsupported(),
            self.failed(),
            self.duration_ms
        )
    }
}

/// Renders every missing tile of a per-zoom plan, one blocking worker per
/// zoom level.
///
/// Workers share nothing but the [`TileService`]; a tile rendered twice by
/// overlapping plans or by an on-demand request is merely wasted work.
#[derive(Debug, Clone)]
pub struct ParallelZoomFanOut {
    service: Arc<TileService>,
}

impl ParallelZoomFanOut {
    pub fn new(service: Arc<TileService>) -> Self {
        Self { service }
    }

    /// Run the plan and wait for every zoom worker to finish.
    ///
    /// Render failures are counted per zoom and never stop other tiles or
    /// other workers.
    pub async fn run(&self, plan: &[ZoomRect]) -> FanOutReport {
        let start = Instant::now();

        let workers = plan.iter().map(|zoom_rect| {
            let service = Arc::clone(&self.service);
            let zoom_rect = *zoom_rect;
            tokio::task::spawn_blocking(move || walk_zoom(&service, zoom_rect))
        });
        let results = join_all(workers).await;

        let zooms = plan
            .iter()
            .zip(results)
            .map(|(zoom_rect, result)| match result {
                Ok(report) => report,
                Err(e) => {
                    warn!(zoom = zoom_rect.zoom, error = %e, "Zoom worker aborted");
                    ZoomReport {
                        failed: 1,
                        aborted: true,
                        ..ZoomReport::new(zoom_rect.zoom)
                    }
                }
            })
            .collect();

        FanOutReport {
            zooms,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

fn walk_zoom(service: &TileService, zoom_rect: ZoomRect) -> ZoomReport {
    info!(
        zoom = zoom_rect.zoom,
        rect = %zoom_rect.rect,
        tiles = zoom_rect.tile_count(),
        "Zoom worker started"
    );

    let mut report = ZoomReport::new(zoom_rect.zoom);
    for tile in zoom_rect.tiles() {
        match service.render_if_missing(&tile) {
            Ok(outcome) => report.record(outcome),
            Err(e) => {
                warn!(tile = %tile, error = %e, "Prerender failed, will retry next cycle");
                report.failed += 1;
            }
        }
    }

    debug!(?report, "Zoom worker report");
    info!(
        zoom = report.zoom,
        rendered = report.rendered,
        cached = report.cached,
        failed = report.failed,
        "Zoom worker finished"
    );
    report
}
