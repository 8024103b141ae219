//! Cache-then-render-then-store resolution shared by every caller.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::cache::{CacheError, TileCacheStore};
use crate::coord::{CoordError, TileCoord};
use crate::render::{RenderError, RenderOutput, Renderer};

/// Errors that can occur while resolving a tile.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid tile: {0}")]
    InvalidTile(#[from] CoordError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Outcome of resolving a tile for a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileLookup {
    /// Served from the cache.
    Hit(Vec<u8>),
    /// Rendered on demand and stored before returning.
    Rendered(Vec<u8>),
    /// Outside the map data; nothing was stored.
    Unsupported,
}

impl TileLookup {
    /// The raster bytes, if any.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            TileLookup::Hit(data) | TileLookup::Rendered(data) => Some(data),
            TileLookup::Unsupported => None,
        }
    }
}

/// Outcome of a render-if-missing step during prerendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrerenderOutcome {
    Unsupported,
    Cached,
    Rendered,
}

/// A cache paired with the renderer that fills it.
///
/// Built once at startup and shared by handle with the front ends and the
/// prerender workers. All methods block on file-system and render work.
pub struct TileService {
    store: Arc<TileCacheStore>,
    renderer: Arc<dyn Renderer>,
}

impl TileService {
    pub fn new(store: Arc<TileCacheStore>, renderer: Arc<dyn Renderer>) -> Self {
        Self { store, renderer }
    }

    pub fn store(&self) -> &Arc<TileCacheStore> {
        &self.store
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    /// Resolve a tile for a client: cache hit, else render and store.
    ///
    /// The entry is fully stored before the rendered bytes are returned.
    pub fn fetch(&self, tile: &TileCoord) -> Result<TileLookup, ServiceError> {
        tile.validate()?;

        if let Some(data) = self.store.get(tile)? {
            trace!(tile = %tile, "Cache hit");
            return Ok(TileLookup::Hit(data));
        }

        debug!(tile = %tile, "Cache miss, rendering");
        Ok(match self.render_and_store(tile)? {
            Some(data) => TileLookup::Rendered(data),
            None => TileLookup::Unsupported,
        })
    }

    /// Render a tile unconditionally and store the result, replacing any
    /// existing entry. Returns `None` for unsupported tiles.
    pub fn render_and_store(&self, tile: &TileCoord) -> Result<Option<Vec<u8>>, ServiceError> {
        tile.validate()?;

        match self.renderer.render(tile)? {
            RenderOutput::Raster(data) => {
                self.store.put(tile, &data)?;
                Ok(Some(data))
            }
            RenderOutput::Unsupported => Ok(None),
        }
    }

    /// Prerender step: skip unsupported and cached tiles, otherwise render
    /// and store.
    pub fn render_if_missing(&self, tile: &TileCoord) -> Result<PrerenderOutcome, ServiceError> {
        if !self.renderer.supports(tile) {
            return Ok(PrerenderOutcome::Unsupported);
        }
        if self.store.exists(tile) {
            return Ok(PrerenderOutcome::Cached);
        }

        Ok(match self.render_and_store(tile)? {
            Some(_) => PrerenderOutcome::Rendered,
            None => PrerenderOutcome::Unsupported,
        })
    }
}

impl std::fmt::Debug for TileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileService")
            .field("store", &self.store.root())
            .finish_non_exhaustive()
    }
}
