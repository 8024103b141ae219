//! Stand-in renderer producing flat preview tiles.
//!
//! Each supported tile is a solid fill whose shade depends on the zoom level,
//! framed by a one-pixel border so tile seams are visible in a map viewer.
//! Good enough to run the whole server end to end without a vector renderer.

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use super::{GeoBounds, RenderError, RenderOutput, Renderer};
use crate::coord::{TileCoord, MAX_ZOOM};

/// Edge length of a rendered tile in pixels.
pub const TILE_SIZE: u32 = 256;

const BORDER: Rgba<u8> = Rgba([96, 96, 96, 255]);

/// Renders zoom-tinted placeholder tiles inside a coverage box.
#[derive(Debug, Clone)]
pub struct PreviewRenderer {
    coverage: GeoBounds,
}

impl PreviewRenderer {
    pub fn new(coverage: GeoBounds) -> Self {
        Self { coverage }
    }

    pub fn coverage(&self) -> &GeoBounds {
        &self.coverage
    }

    fn fill_for(zoom: u8) -> Rgba<u8> {
        let step = (u32::from(zoom) * 160 / u32::from(MAX_ZOOM)) as u8;
        Rgba([235 - step, 230 - step / 2, 200, 255])
    }
}

impl Renderer for PreviewRenderer {
    fn supports(&self, tile: &TileCoord) -> bool {
        self.coverage.intersects(tile)
    }

    fn render(&self, tile: &TileCoord) -> Result<RenderOutput, RenderError> {
        if !tile.is_valid() {
            return Err(RenderError::InvalidTile(*tile));
        }
        if !self.supports(tile) {
            return Ok(RenderOutput::Unsupported);
        }

        let fill = Self::fill_for(tile.zoom);
        let image = RgbaImage::from_fn(TILE_SIZE, TILE_SIZE, |x, y| {
            if x == 0 || y == 0 || x == TILE_SIZE - 1 || y == TILE_SIZE - 1 {
                BORDER
            } else {
                fill
            }
        });

        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| RenderError::Encoding {
                tile: *tile,
                reason: e.to_string(),
            })?;

        Ok(RenderOutput::Raster(png.into_inner()))
    }
}
