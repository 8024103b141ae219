//! Prerender module
//!
//! Proactive rendering of expensive, widely shared tiles:
//!
//! - [`region`]: quad-tree expansion of a rectangle to deeper zoom levels
//! - [`ParallelZoomFanOut`]: one blocking worker per zoom level, joined
//! - [`PrerenderScheduler`]: sweep, global band, named areas, sleep, repeat

mod fanout;
pub mod region;
mod scheduler;

pub use fanout::{FanOutReport, ParallelZoomFanOut, ZoomReport};
pub use region::{expand, global_band, PrerenderArea, ZoomRect, REFERENCE_ZOOM};
pub use scheduler::{
    CycleReport, PrerenderConfig, PrerenderScheduler, DEFAULT_GLOBAL_MAX_ZOOM, DEFAULT_INTERVAL,
    SENTINEL_TILE,
};
