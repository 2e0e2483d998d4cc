//! GeoJSON export of routes.
//!
//! Enable the `geojson` feature to use this module.
//!
//! # Example
//!
//! ```ignore
//! use roadbook::geojson::{add_elevations, route_feature, route_line};
//!
//! let route = graph.shortest_route(from, to)?;
//! let line = add_elevations(&service, route_line(&graph, &route.nodes)?)?;
//! let feature = route_feature(line, &profile);
//! println!("{}", feature);
//! ```

use geojson::{Feature, Geometry, JsonObject, JsonValue, LineStringType, Position, Value};

use crate::coordinates::GeodeticPoint;
use crate::elevation::RasterSource;
use crate::error::{Result, RoadbookError};
use crate::graph::{NodeId, RoutingGraph};
use crate::profile::RouteProfile;

/// Positions of the nodes of a path, in GeoJSON `[lon, lat]` order.
pub fn route_line<G: RoutingGraph + ?Sized>(graph: &G, nodes: &[NodeId]) -> Result<LineStringType> {
    nodes
        .iter()
        .map(|&node| {
            let point = graph.node_coordinate(node)?;
            Ok(vec![point.lon, point.lat])
        })
        .collect()
}

/// Add the terrain elevation to every position of a line.
///
/// Positions where `source` has no valid measurement are left
/// two-dimensional. An existing altitude is replaced.
///
/// # Errors
///
/// Returns an error if a position has fewer than 2 elements, cannot be
/// projected, or its tile cannot be read.
pub fn add_elevations<S: RasterSource>(source: &S, line: LineStringType) -> Result<LineStringType> {
    line.iter()
        .map(|position| add_elevation(source, position))
        .collect()
}

fn add_elevation<S: RasterSource>(source: &S, position: &[f64]) -> Result<Position> {
    let [lon, lat, ..] = *position else {
        return Err(RoadbookError::CoordinateTransform {
            x: position.first().copied().unwrap_or(f64::NAN),
            y: f64::NAN,
            reason: "position must have at least 2 elements (lon, lat)",
        });
    };

    let projected = GeodeticPoint::new(lat, lon).to_projected()?;
    Ok(match source.sample(projected)? {
        Some(elevation) => vec![lon, lat, elevation],
        None => vec![lon, lat],
    })
}

/// LineString feature of a route carrying the profile as properties.
///
/// Properties: the [`RouteProfile`] fields plus `effort` and
/// `estimated_time_hours`.
pub fn route_feature(line: LineStringType, profile: &RouteProfile) -> Feature {
    let mut properties = JsonObject::new();
    for (key, value) in [
        ("distance_km", profile.distance_km),
        ("total_ascent", profile.total_ascent),
        ("total_descent", profile.total_descent),
        ("highest_point", profile.highest_point),
        ("lowest_point", profile.lowest_point),
        ("effort", profile.effort()),
        ("estimated_time_hours", profile.estimated_time_hours()),
    ] {
        properties.insert(key.to_string(), JsonValue::from(value));
    }

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::LineString(line))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
