//! Coordinate module
//!
//! Tile addressing for the slippy map quad-tree and conversions between tile
//! coordinates and geographic (Web Mercator) coordinates.

mod types;

pub use types::{
    tiles_per_axis, CoordError, TileCoord, TileRect, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON,
};

use std::f64::consts::PI;

/// Converts geographic coordinates to tile coordinates.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to [`MAX_ZOOM`])
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = 2.0_f64.powi(zoom as i32);
    let max_index = tiles_per_axis(zoom) as u32 - 1;

    let x = ((lon + 180.0) / 360.0 * n) as u32;

    let lat_rad = lat * PI / 180.0;
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n) as u32;

    // lon = 180 and lat = MIN_LAT land exactly on the far edge
    Ok(TileCoord::new(zoom, x.min(max_index), y.min(max_index)))
}

/// Converts tile coordinates back to geographic coordinates.
///
/// Returns the latitude/longitude of the tile's northwest corner.
#[inline]
pub fn tile_to_lat_lon(tile: &TileCoord) -> (f64, f64) {
    corner_to_lat_lon(tile.zoom, f64::from(tile.x), f64::from(tile.y))
}

/// Geographic bounds of a tile as `(north, west, south, east)`.
pub fn tile_bounds(tile: &TileCoord) -> (f64, f64, f64, f64) {
    let (north, west) = tile_to_lat_lon(tile);
    let (south, east) = corner_to_lat_lon(
        tile.zoom,
        f64::from(tile.x) + 1.0,
        f64::from(tile.y) + 1.0,
    );
    (north, west, south, east)
}

fn corner_to_lat_lon(zoom: u8, x: f64, y: f64) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32);

    let lon = x / n * 360.0 - 180.0;

    let lat_rad = (PI * (1.0 - 2.0 * y / n)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    (lat, lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_berlin_at_zoom_12() {
        // Berlin: 52.52°N, 13.405°E
        let tile = to_tile_coords(52.52, 13.405, 12).unwrap();
        assert_eq!(tile.zoom, 12);
        assert_eq!(tile.x, 2200);
        assert_eq!(tile.y, 1343);
    }

    #[test]
    fn test_invalid_latitude() {
        let result = to_tile_coords(90.0, 0.0, 10);
        assert!(matches!(
            result.unwrap_err(),
            CoordError::InvalidLatitude(_)
        ));
    }

    #[test]
    fn test_invalid_zoom() {
        let result = to_tile_coords(0.0, 0.0, MAX_ZOOM + 1);
        assert!(matches!(result.unwrap_err(), CoordError::InvalidZoom(_)));
    }

    #[test]
    fn test_far_east_edge_clamped() {
        let tile = to_tile_coords(0.0, 180.0, 3).unwrap();
        assert_eq!(tile.x, 7);
    }

    #[test]
    fn test_world_tile_bounds() {
        let (north, west, south, east) = tile_bounds(&TileCoord::new(0, 0, 0));
        assert!((north - MAX_LAT).abs() < 1e-6);
        assert!((south - MIN_LAT).abs() < 1e-6);
        assert_eq!(west, -180.0);
        assert_eq!(east, 180.0);
    }

    #[test]
    fn test_tile_to_lat_lon_at_equator() {
        let (lat, lon) = tile_to_lat_lon(&TileCoord::new(10, 512, 512));
        assert!(lat.abs() < 1e-9, "Should be on the equator");
        assert!(lon.abs() < 1e-9, "Should be on the prime meridian");
    }

    #[test]
    fn test_checked_accepts_grid_edge() {
        assert!(TileCoord::checked(3, 7, 7).is_ok());
        assert!(TileCoord::checked(0, 0, 0).is_ok());
    }

    #[test]
    fn test_checked_rejects_outside_grid() {
        assert_eq!(
            TileCoord::checked(3, 8, 0),
            Err(CoordError::OutOfRange { zoom: 3, x: 8, y: 0 })
        );
        assert!(TileCoord::checked(0, 0, 1).is_err());
        assert!(TileCoord::checked(MAX_ZOOM + 1, 0, 0).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(TileCoord::new(5, 10, 20).to_string(), "5/10/20");
        assert_eq!(TileRect::new(1, 2, 3, 4).to_string(), "[1..=3]x[2..=4]");
    }

    #[test]
    fn test_rect_tile_count() {
        assert_eq!(TileRect::world().tile_count(), 1);
        assert_eq!(TileRect::new(65, 40, 69, 44).tile_count(), 25);
        assert_eq!(TileRect::new(2, 0, 1, 0).tile_count(), 0);
    }

    #[test]
    fn test_rect_contains_rect() {
        let outer = TileRect::new(0, 0, 7, 7);
        assert!(outer.contains_rect(&TileRect::new(2, 2, 5, 5)));
        assert!(!outer.contains_rect(&TileRect::new(2, 2, 8, 5)));
    }
}
