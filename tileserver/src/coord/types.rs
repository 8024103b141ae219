//! Coordinate type definitions

use std::fmt;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Deepest zoom level the server will address.
pub const MAX_ZOOM: u8 = 22;

/// Tile coordinates in the slippy map quad-tree.
///
/// Zoom level `z` is a `2^z × 2^z` grid; `x` grows eastward and `y` grows
/// southward, both starting at 0 in the north-west corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Zoom level (quad-tree depth)
    pub zoom: u8,
    /// Column, 0 at the antimeridian west edge
    pub x: u32,
    /// Row, 0 at the northern edge
    pub y: u32,
}

impl TileCoord {
    /// Create a tile coordinate without validation.
    pub const fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Create a tile coordinate, rejecting values outside the quad-tree.
    pub fn checked(zoom: u8, x: u32, y: u32) -> Result<Self, CoordError> {
        let coord = Self { zoom, x, y };
        coord.validate()?;
        Ok(coord)
    }

    /// Verify that `x` and `y` lie in `[0, 2^zoom - 1]`.
    pub fn validate(&self) -> Result<(), CoordError> {
        if self.zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(self.zoom));
        }
        let n = tiles_per_axis(self.zoom);
        if u64::from(self.x) >= n || u64::from(self.y) >= n {
            return Err(CoordError::OutOfRange {
                zoom: self.zoom,
                x: self.x,
                y: self.y,
            });
        }
        Ok(())
    }

    /// Whether the coordinate is a valid tile.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Inclusive rectangle of tiles at a single zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl TileRect {
    pub const fn new(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The single tile covering the whole world at zoom 0.
    pub const fn world() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Number of tiles in the rectangle.
    pub fn tile_count(&self) -> u64 {
        if self.max_x < self.min_x || self.max_y < self.min_y {
            return 0;
        }
        u64::from(self.max_x - self.min_x + 1) * u64::from(self.max_y - self.min_y + 1)
    }

    /// Whether the column/row pair falls inside the rectangle.
    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    /// Whether every tile of `other` is also part of `self`.
    pub fn contains_rect(&self, other: &TileRect) -> bool {
        self.contains(other.min_x, other.min_y) && self.contains(other.max_x, other.max_y)
    }
}

impl fmt::Display for TileRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}..={}]x[{}..={}]",
            self.min_x, self.max_x, self.min_y, self.max_y
        )
    }
}

/// Number of tiles along one axis at the given zoom.
#[inline]
pub fn tiles_per_axis(zoom: u8) -> u64 {
    1u64 << zoom
}

/// Errors that can occur during coordinate handling.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Latitude is outside valid range (-85.05112878 to 85.05112878)
    InvalidLatitude(f64),
    /// Longitude is outside valid range (-180.0 to 180.0)
    InvalidLongitude(f64),
    /// Zoom level is deeper than [`MAX_ZOOM`]
    InvalidZoom(u8),
    /// Column or row outside the zoom level's grid
    OutOfRange { zoom: u8, x: u32, y: u32 },
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::InvalidLatitude(lat) => {
                write!(
                    f,
                    "Invalid latitude: {} (must be between {} and {})",
                    lat, MIN_LAT, MAX_LAT
                )
            }
            CoordError::InvalidLongitude(lon) => {
                write!(
                    f,
                    "Invalid longitude: {} (must be between {} and {})",
                    lon, MIN_LON, MAX_LON
                )
            }
            CoordError::InvalidZoom(zoom) => {
                write!(f, "Invalid zoom level: {} (max {})", zoom, MAX_ZOOM)
            }
            CoordError::OutOfRange { zoom, x, y } => {
                write!(
                    f,
                    "Tile {}/{}/{} is outside the {}x{} grid of zoom {}",
                    zoom,
                    x,
                    y,
                    tiles_per_axis(*zoom),
                    tiles_per_axis(*zoom),
                    zoom
                )
            }
        }
    }
}

impl std::error::Error for CoordError {}
