//! Tileserver - raster map tiles with a file-system cache
//!
//! This library serves map tiles addressed by `(zoom, x, y)`. Tiles are
//! rendered on demand through a [`render::Renderer`] and cached on disk so
//! repeat requests are served without re-rendering. A scheduler prerenders
//! the expensive low-zoom tiles on a recurring cycle, and three front ends
//! (HTTP, raw socket, file queue) accept requests.
//!
//! # Modules
//!
//! - [`coord`]: tile coordinates and Web Mercator conversions
//! - [`cache`]: on-disk tile store and staleness policies
//! - [`render`]: renderer trait and the bundled preview renderer
//! - [`map`]: map data and theme discovery
//! - [`service`]: cache-then-render resolution shared by all callers
//! - [`prerender`]: region expansion, per-zoom fan-out, scheduler
//! - [`frontend`]: HTTP, socket and file-queue front ends
//! - [`config`]: INI configuration
//! - [`app`]: startup checks and wiring
//! - [`logging`]: tracing setup

pub mod app;
pub mod cache;
pub mod config;
pub mod coord;
pub mod frontend;
pub mod logging;
pub mod map;
pub mod prerender;
pub mod render;
pub mod service;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
