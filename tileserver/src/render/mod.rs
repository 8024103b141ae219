//! Renderer abstraction.
//!
//! Turning map data and a style theme into pixels happens behind the
//! [`Renderer`] trait. The cache, the prerender fan-out and every front end
//! only see this interface, so a real vector renderer and the bundled
//! [`PreviewRenderer`] are interchangeable.
//!
//! # Example
//!
//! ```
//! use tileserver::coord::TileCoord;
//! use tileserver::render::{GeoBounds, PreviewRenderer, RenderOutput, Renderer};
//!
//! let renderer = PreviewRenderer::new(GeoBounds::world());
//! match renderer.render(&TileCoord::new(0, 0, 0)).unwrap() {
//!     RenderOutput::Raster(png) => assert_eq!(&png[1..4], b"PNG"),
//!     RenderOutput::Unsupported => unreachable!(),
//! }
//! ```

mod coverage;
mod preview;

pub use coverage::GeoBounds;
pub use preview::{PreviewRenderer, TILE_SIZE};

use thiserror::Error;

use crate::coord::TileCoord;

/// Result of rendering a single tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutput {
    /// Encoded PNG bytes.
    Raster(Vec<u8>),
    /// The tile lies outside the loaded map data. Not a failure.
    Unsupported,
}

/// Errors that can occur while rendering a tile.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The coordinate does not address a tile of the quad-tree.
    #[error("Invalid tile {0}")]
    InvalidTile(TileCoord),

    /// The rasterised tile could not be encoded.
    #[error("Encoding failed for tile {tile}: {reason}")]
    Encoding { tile: TileCoord, reason: String },

    /// Any other renderer-specific failure.
    #[error("Render failed for tile {tile}: {reason}")]
    Failed { tile: TileCoord, reason: String },
}

/// A tile rendering strategy.
///
/// Implementations must be thread-safe (`Send + Sync`): one instance is
/// shared by every front end and every prerender worker. Rendering the same
/// tile twice must produce the same bytes.
pub trait Renderer: Send + Sync {
    /// Whether the tile falls inside the renderer's map data.
    ///
    /// Used by the prerender fan-out to skip tiles without rendering them.
    fn supports(&self, tile: &TileCoord) -> bool {
        let _ = tile;
        true
    }

    /// Render a tile. Blocking; callers on an async runtime must move it to
    /// a blocking thread.
    fn render(&self, tile: &TileCoord) -> Result<RenderOutput, RenderError>;
}
