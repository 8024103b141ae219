//! Quad-tree expansion of prerender regions.

use std::fmt;

use crate::coord::{tiles_per_axis, TileCoord, TileRect, MAX_ZOOM};

/// Zoom level at which named prerender areas are defined.
pub const REFERENCE_ZOOM: u8 = 7;

/// A tile rectangle at a specific zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomRect {
    pub zoom: u8,
    pub rect: TileRect,
}

impl ZoomRect {
    /// Iterate the rectangle's tiles, x outer and y inner, both ascending.
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        let zoom = self.zoom;
        let rect = self.rect;
        (rect.min_x..=rect.max_x)
            .flat_map(move |x| (rect.min_y..=rect.max_y).map(move |y| TileCoord::new(zoom, x, y)))
    }

    pub fn tile_count(&self) -> u64 {
        self.rect.tile_count()
    }
}

/// Expand `rect`, defined at zoom `z0`, to every zoom from `z0` to
/// `max_zoom` inclusive.
///
/// At depth `d = z - z0` the result is
/// `(min·2^d, min·2^d, max·2^d + 2^d - 1, max·2^d + 2^d - 1)`, the full
/// footprint of all descendants of the original rectangle.
///
/// ```
/// use tileserver::coord::TileRect;
/// use tileserver::prerender::expand;
///
/// let plan = expand(TileRect::new(65, 40, 69, 44), 7, 8);
/// assert_eq!(plan[1].rect, TileRect::new(130, 80, 139, 89));
/// ```
pub fn expand(rect: TileRect, z0: u8, max_zoom: u8) -> Vec<ZoomRect> {
    (z0..=max_zoom)
        .map(|zoom| {
            let scale = 1u32 << (zoom - z0);
            ZoomRect {
                zoom,
                rect: TileRect::new(
                    rect.min_x * scale,
                    rect.min_y * scale,
                    rect.max_x * scale + scale - 1,
                    rect.max_y * scale + scale - 1,
                ),
            }
        })
        .collect()
}

/// The global low-zoom band: the whole world from zoom 0 to `max_zoom`.
pub fn global_band(max_zoom: u8) -> Vec<ZoomRect> {
    expand(TileRect::world(), 0, max_zoom)
}

/// A named region prerendered from [`REFERENCE_ZOOM`] down to `max_zoom`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrerenderArea {
    pub name: String,
    /// Rectangle at [`REFERENCE_ZOOM`].
    pub rect: TileRect,
    pub max_zoom: u8,
}

impl PrerenderArea {
    pub fn new(name: impl Into<String>, rect: TileRect, max_zoom: u8) -> Self {
        Self {
            name: name.into(),
            rect,
            max_zoom,
        }
    }

    /// The built-in area: Germany at zoom 7, prerendered down to zoom 12.
    pub fn germany() -> Self {
        Self::new("germany", TileRect::new(65, 40, 69, 44), 12)
    }

    /// Check the rectangle lies on the reference grid and the zoom range is
    /// usable. Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        let n = tiles_per_axis(REFERENCE_ZOOM);
        if self.rect.min_x > self.rect.max_x || self.rect.min_y > self.rect.max_y {
            return Err(format!("empty rectangle {}", self.rect));
        }
        if u64::from(self.rect.max_x) >= n || u64::from(self.rect.max_y) >= n {
            return Err(format!(
                "rectangle {} exceeds the {}x{} grid of zoom {}",
                self.rect, n, n, REFERENCE_ZOOM
            ));
        }
        if !(REFERENCE_ZOOM..=MAX_ZOOM).contains(&self.max_zoom) {
            return Err(format!(
                "max_zoom {} must be between {} and {}",
                self.max_zoom, REFERENCE_ZOOM, MAX_ZOOM
            ));
        }
        Ok(())
    }

    /// Per-zoom rectangles covering this area.
    pub fn plan(&self) -> Vec<ZoomRect> {
        expand(self.rect, REFERENCE_ZOOM, self.max_zoom)
    }
}

impl fmt::Display for PrerenderArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}@z{} to z{}",
            self.name, self.rect, REFERENCE_ZOOM, self.max_zoom
        )
    }
}
