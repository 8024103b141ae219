//! Tile cache module
//!
//! File-system backed storage for rendered tiles, addressed by
//! [`TileCoord`](crate::coord::TileCoord), and the policies that decide when
//! entries must be thrown away.
//!
//! # Layout
//!
//! ```text
//! <cache_root>/
//! └── <zoom>/
//!     └── <x>/
//!         └── <y>.png
//! ```
//!
//! Invalidating a whole zoom level is a single directory removal.

mod error;
mod path;
mod staleness;
mod store;

pub use error::CacheError;
pub use path::{column_directory, parse_tile_path, tile_path, zoom_directory, TILE_EXTENSION};
pub use staleness::{
    StalenessPolicy, SweepResult, DEFAULT_MAX_AGE, DEFAULT_ZOOM_CEILING,
};
pub use store::{CacheEntry, TileCacheStore, ZoomStats};
