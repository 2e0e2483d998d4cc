use anyhow::{Context, Result};
use roadbook::{GeodeticPoint, ProjectedPoint};
use serde::Serialize;

use super::Location;

#[derive(Serialize)]
struct ConvertResponse {
    lat: f64,
    lon: f64,
    north: f64,
    east: f64,
}

pub fn run(location: Location, json: bool) -> Result<()> {
    let (geodetic, projected): (GeodeticPoint, ProjectedPoint) = match location {
        Location::Geodetic(p) => (p, p.to_projected().context("Failed to project coordinates")?),
        Location::Projected(p) => (p.to_geodetic().context("Failed to unproject coordinates")?, p),
    };

    if json {
        let response = ConvertResponse {
            lat: geodetic.lat,
            lon: geodetic.lon,
            north: projected.north,
            east: projected.east,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        match location {
            Location::Geodetic(_) => println!("{:.3} {:.3}", projected.north, projected.east),
            Location::Projected(_) => println!("{:.8} {:.8}", geodetic.lat, geodetic.lon),
        }
    }

    Ok(())
}
