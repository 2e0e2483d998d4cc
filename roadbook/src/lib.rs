//! # Roadbook - Walking-Route Profiles
//!
//! Distance, climb and walking-time estimates for hikes in the Swedish
//! mountains, computed from a pedestrian routing graph and the national
//! elevation model in SWEREF 99 TM tiles.
//!
//! ## Features
//!
//! - **Offline**: Works with a saved graph file and local GeoTIFF tiles
//! - **Lazy**: The routing graph is loaded on first use and kept
//! - **Memory-mapped tiles**: Each lookup maps one tile and releases it
//!
//! ## Quick Start
//!
//! ```ignore
//! use roadbook::{GeodeticPoint, WalkRoute};
//!
//! let abisko = GeodeticPoint::new(68.358554, 18.779669);
//! let bivouac = GeodeticPoint::new(68.286084, 18.590195);
//!
//! let mut route = WalkRoute::builder(abisko, bivouac)
//!     .tile_dir("/data/nh_all")
//!     .graph_file("/data/walk_route.json")
//!     .build();
//!
//! let profile = route.profile()?;
//! println!(
//!     "{:.1} km, +{:.0} m / {:.0} m, about {:.1} h",
//!     profile.distance_km,
//!     profile.total_ascent,
//!     profile.total_descent,
//!     profile.estimated_time_hours(),
//! );
//! ```
//!
//! ## Elevation Tiles
//!
//! Tiles are single-band GeoTIFFs covering 100 km × 100 km of the
//! SWEREF 99 TM grid, named `nh_{north/100000}_{east/100000}.tif`.
//! Samples below -100 m, or equal to the file's GDAL nodata value, are
//! treated as missing and left out of the profile.
//!
//! ## Cargo Features
//!
//! - `download`: build a missing graph file from OpenStreetMap via the
//!   Overpass API
//! - `geojson`: export routes as GeoJSON features

pub mod coordinates;
pub mod elevation;
pub mod error;
#[cfg(feature = "geojson")]
pub mod geojson;
pub mod graph;
#[cfg(feature = "download")]
pub mod overpass;
pub mod profile;
pub mod route;
pub mod store;
pub mod tile;
pub mod tiling;

// Re-export main types at crate root for convenience
pub use coordinates::{GeodeticPoint, ProjectedPoint};
pub use elevation::{ElevationQuery, ElevationService, ElevationServiceBuilder, RasterSource};
pub use error::{Result, RoadbookError};
pub use graph::{NodeId, Route, RoutingGraph, WalkGraph};
pub use profile::RouteProfile;
pub use route::{WalkRoute, WalkRouteBuilder};
pub use store::{GraphProvider, GraphRegion, GraphStore, Preloaded, ServiceArea};
pub use tile::ElevationTile;
