//! Geographic coverage of the loaded map data.

use std::fmt;
use std::str::FromStr;

use crate::coord::{tile_bounds, TileCoord, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Longitude/latitude bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl GeoBounds {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// The whole Web Mercator world.
    pub fn world() -> Self {
        Self::new(MIN_LON, MIN_LAT, MAX_LON, MAX_LAT)
    }

    /// Whether the tile's footprint overlaps the box. Shared edges count.
    pub fn intersects(&self, tile: &TileCoord) -> bool {
        let (north, west, south, east) = tile_bounds(tile);
        west <= self.max_lon && east >= self.min_lon && south <= self.max_lat && north >= self.min_lat
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self::world()
    }
}

impl fmt::Display for GeoBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

impl FromStr for GeoBounds {
    type Err = String;

    /// Parse `min_lon,min_lat,max_lon,max_lat`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<f64>()
                    .map_err(|_| format!("'{}' is not a number", part.trim()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let [min_lon, min_lat, max_lon, max_lat] = values[..] else {
            return Err(format!("expected 4 comma-separated values, got {}", values.len()));
        };

        if !(MIN_LON..=MAX_LON).contains(&min_lon) || !(MIN_LON..=MAX_LON).contains(&max_lon) {
            return Err("longitude must be between -180 and 180".to_string());
        }
        if !(-90.0..=90.0).contains(&min_lat) || !(-90.0..=90.0).contains(&max_lat) {
            return Err("latitude must be between -90 and 90".to_string());
        }
        if min_lon > max_lon || min_lat > max_lat {
            return Err("minimum must not exceed maximum".to_string());
        }

        Ok(Self::new(min_lon, min_lat, max_lon, max_lat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn germany() -> GeoBounds {
        GeoBounds::new(5.8, 47.2, 15.1, 55.1)
    }

    #[test]
    fn test_world_intersects_everything() {
        let world = GeoBounds::world();
        assert!(world.intersects(&TileCoord::new(0, 0, 0)));
        assert!(world.intersects(&TileCoord::new(12, 0, 4095)));
    }

    #[test]
    fn test_germany_coverage() {
        let bounds = germany();
        // Berlin at zoom 12
        assert!(bounds.intersects(&TileCoord::new(12, 2200, 1343)));
        // South Pacific
        assert!(!bounds.intersects(&TileCoord::new(12, 100, 3000)));
        // Zoom 0 always overlaps
        assert!(bounds.intersects(&TileCoord::new(0, 0, 0)));
    }

    #[test]
    fn test_parse() {
        let bounds: GeoBounds = "5.8, 47.2, 15.1, 55.1".parse().unwrap();
        assert_eq!(bounds, germany());
        assert_eq!(bounds.to_string(), "5.8,47.2,15.1,55.1");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("1,2,3".parse::<GeoBounds>().is_err());
        assert!("a,2,3,4".parse::<GeoBounds>().is_err());
        assert!("10,0,5,1".parse::<GeoBounds>().is_err());
        assert!("0,0,200,1".parse::<GeoBounds>().is_err());
    }
}
