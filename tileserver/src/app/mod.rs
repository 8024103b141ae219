//! Application bootstrap and lifecycle management.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      TileServerApp                        │
//! │                                                           │
//! │  TileCacheStore ──┐                                       │
//! │  Renderer ────────┴──► TileService ──┬──► HTTP            │
//! │                                      ├──► Socket pool     │
//! │  MapDataSet ─────────────┐           ├──► File queue      │
//! │                          └──────────►└──► Prerender       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tileserver::app::{AppConfig, TileServerApp};
//!
//! let app = TileServerApp::start(AppConfig::from(&config_file))?;
//! let scheduler = app.scheduler(config_file.prerender_config());
//! ```

mod bootstrap;
mod config;
mod error;

pub use bootstrap::TileServerApp;
pub use config::AppConfig;
pub use error::AppError;
