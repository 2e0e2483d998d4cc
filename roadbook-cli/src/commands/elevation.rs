use anyhow::{Context, Result};
use roadbook::{ElevationQuery, ElevationService, RasterSource};
use serde::Serialize;
use std::path::PathBuf;

use super::Location;

#[derive(Serialize)]
struct ElevationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lon: Option<f64>,
    north: f64,
    east: f64,
    tile: String,
    elevation: Option<f64>,
}

pub fn run(tile_dir: PathBuf, nodata_threshold: f64, location: Location, json: bool) -> Result<()> {
    let (geodetic, point) = match location {
        Location::Geodetic(geodetic) => (
            Some(geodetic),
            geodetic
                .to_projected()
                .context("Failed to project coordinates")?,
        ),
        Location::Projected(point) => (None, point),
    };

    let service = ElevationService::builder(&tile_dir)
        .nodata_threshold(nodata_threshold)
        .build();
    let elevation = service
        .sample(point)
        .context("Failed to get elevation")?;

    if json {
        let tile = ElevationQuery::new(point, &tile_dir)
            .tile_path()
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let response = ElevationResponse {
            lat: geodetic.map(|p| p.lat),
            lon: geodetic.map(|p| p.lon),
            north: point.north,
            east: point.east,
            tile,
            elevation,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        match elevation {
            Some(elev) => println!("{:.1}", elev),
            None => println!("nodata"),
        }
    }

    Ok(())
}
