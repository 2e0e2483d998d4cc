use anyhow::{bail, Context, Result};
use clap::Args;
use roadbook::{GeodeticPoint, ProjectedPoint};
use std::path::PathBuf;

pub mod convert;
pub mod elevation;
pub mod fetch_graph;
pub mod profile;
pub mod tiles;

/// A point given either in degrees or in grid metres.
#[derive(Args)]
pub struct LocationArgs {
    /// Latitude in decimal degrees
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude in decimal degrees
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,

    /// SWEREF 99 TM northing in metres
    #[arg(long, requires = "east", conflicts_with_all = ["lat", "lon"])]
    north: Option<f64>,

    /// SWEREF 99 TM easting in metres
    #[arg(long, requires = "north", conflicts_with_all = ["lat", "lon"])]
    east: Option<f64>,
}

pub enum Location {
    Geodetic(GeodeticPoint),
    Projected(ProjectedPoint),
}

impl LocationArgs {
    pub fn resolve(&self) -> Result<Location> {
        match (self.lat, self.lon, self.north, self.east) {
            (Some(lat), Some(lon), None, None) => Ok(Location::Geodetic(GeodeticPoint::new(lat, lon))),
            (None, None, Some(north), Some(east)) => {
                Ok(Location::Projected(ProjectedPoint::new(north, east)))
            }
            _ => bail!("Give either --lat and --lon, or --north and --east"),
        }
    }
}

/// Resolve the tile directory, which has no default.
pub fn tile_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = dir.context(
        "ROADBOOK_TILE_DIR environment variable not set. Use --tile-dir or set ROADBOOK_TILE_DIR",
    )?;
    if !dir.is_dir() {
        bail!("Tile directory does not exist: {}", dir.display());
    }
    Ok(dir)
}

/// Parse `LAT,LON` in decimal degrees.
pub fn parse_point(s: &str) -> std::result::Result<GeodeticPoint, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got {s:?}"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|e| format!("invalid latitude {lat:?}: {e}"))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|e| format!("invalid longitude {lon:?}: {e}"))?;

    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("latitude {lat} out of range"));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(format!("longitude {lon} out of range"));
    }
    Ok(GeodeticPoint::new(lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(
            parse_point("68.358554,18.779669").unwrap(),
            GeodeticPoint::new(68.358554, 18.779669)
        );
        assert_eq!(
            parse_point(" 65.811885 , 15.092382 ").unwrap(),
            GeodeticPoint::new(65.811885, 15.092382)
        );
    }

    #[test]
    fn test_parse_point_invalid() {
        assert!(parse_point("68.35").is_err());
        assert!(parse_point("north,east").is_err());
        assert!(parse_point("91,18").is_err());
        assert!(parse_point("68,181").is_err());
    }
}
