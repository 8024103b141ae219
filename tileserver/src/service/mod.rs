//! Tile service module
//!
//! [`TileService`] is the single path from a tile request to bytes: the
//! HTTP, socket and file-queue front ends and the prerender fan-out all go
//! through it, so the lookup order and write discipline are the same
//! everywhere.

mod tile;

pub use tile::{PrerenderOutcome, ServiceError, TileLookup, TileService};
