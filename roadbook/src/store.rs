//! Where the routing graph comes from.
//!
//! [`GraphStore`] loads a saved [`WalkGraph`] from disk. If the file does
//! not exist it builds the graph for a [`ServiceArea`] and saves it. Building
//! needs the `download` feature; without it a missing file is an error.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::coordinates::GeodeticPoint;
use crate::error::{Result, RoadbookError};
use crate::graph::{RoutingGraph, WalkGraph};
#[cfg(feature = "download")]
use crate::overpass::{OverpassClient, OverpassConfig};

/// Default graph file name.
pub const DEFAULT_GRAPH_FILE: &str = "walk_route.json";

/// Environment variable holding the graph file path.
pub const GRAPH_FILE_ENV: &str = "ROADBOOK_GRAPH_FILE";

/// Radius used by [`GraphRegion::AroundMidpoint`] when none is given.
pub const DEFAULT_RADIUS_M: f64 = 500_000.0;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Latitude/longitude bounding box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceArea {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Default for ServiceArea {
    /// The fjäll between Abisko and Hemavan.
    fn default() -> Self {
        Self {
            north: 68.386792,
            south: 65.701051,
            east: 19.051666,
            west: 14.842529,
        }
    }
}

impl ServiceArea {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// Box reaching `radius_m` metres from `center` in each cardinal
    /// direction.
    pub fn around(center: GeodeticPoint, radius_m: f64) -> Self {
        let dlat = (radius_m / EARTH_RADIUS_M).to_degrees();
        let dlon = dlat / center.lat.to_radians().cos().max(1e-6);
        Self {
            north: (center.lat + dlat).min(90.0),
            south: (center.lat - dlat).max(-90.0),
            east: (center.lon + dlon).min(180.0),
            west: (center.lon - dlon).max(-180.0),
        }
    }

    /// Whether `point` lies inside the box, borders included.
    pub fn contains(&self, point: GeodeticPoint) -> bool {
        (self.south..=self.north).contains(&point.lat) && (self.west..=self.east).contains(&point.lon)
    }
}

/// The area a missing graph is built for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GraphRegion {
    /// Always the same box.
    Fixed(ServiceArea),
    /// A box around the midpoint of origin and destination.
    AroundMidpoint { radius_m: f64 },
}

impl Default for GraphRegion {
    fn default() -> Self {
        GraphRegion::Fixed(ServiceArea::default())
    }
}

impl GraphRegion {
    /// A box of [`DEFAULT_RADIUS_M`] around the route midpoint.
    pub fn around_midpoint() -> Self {
        GraphRegion::AroundMidpoint {
            radius_m: DEFAULT_RADIUS_M,
        }
    }

    /// Resolve to a bounding box for one origin/destination pair.
    pub fn area(&self, origin: GeodeticPoint, destination: GeodeticPoint) -> ServiceArea {
        match *self {
            GraphRegion::Fixed(area) => area,
            GraphRegion::AroundMidpoint { radius_m } => {
                ServiceArea::around(origin.midpoint(&destination), radius_m)
            }
        }
    }
}

/// Supplies the routing graph for a route.
pub trait GraphProvider {
    type Graph: RoutingGraph;

    /// Obtain the graph to route from `origin` to `destination`.
    fn provide(&self, origin: GeodeticPoint, destination: GeodeticPoint) -> Result<Self::Graph>;
}

/// File-backed [`GraphProvider`].
///
/// # Example
///
/// ```ignore
/// use roadbook::store::{GraphRegion, GraphStore};
///
/// let store = GraphStore::new("/data/walk_route.json")
///     .region(GraphRegion::AroundMidpoint { radius_m: 50_000.0 })
///     .rebuild_on_corrupt(true);
/// ```
#[derive(Debug, Clone)]
pub struct GraphStore {
    path: PathBuf,
    region: GraphRegion,
    rebuild_on_corrupt: bool,
    #[cfg(feature = "download")]
    overpass: OverpassConfig,
}

impl GraphStore {
    /// Store backed by the file at `path`, building the default
    /// [`ServiceArea`] if the file is missing.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            region: GraphRegion::default(),
            rebuild_on_corrupt: false,
            #[cfg(feature = "download")]
            overpass: OverpassConfig::default(),
        }
    }

    /// Store configured from `ROADBOOK_GRAPH_FILE`, falling back to
    /// `walk_route.json` in the working directory.
    pub fn from_env() -> Self {
        let path = std::env::var(GRAPH_FILE_ENV).unwrap_or_else(|_| DEFAULT_GRAPH_FILE.to_string());
        Self::new(path)
    }

    /// Set the area a missing graph is built for.
    pub fn region(mut self, region: GraphRegion) -> Self {
        self.region = region;
        self
    }

    /// Replace an unreadable graph file instead of failing.
    pub fn rebuild_on_corrupt(mut self, rebuild: bool) -> Self {
        self.rebuild_on_corrupt = rebuild;
        self
    }

    /// Set the Overpass endpoint and retry policy.
    #[cfg(feature = "download")]
    pub fn overpass(mut self, config: OverpassConfig) -> Self {
        self.overpass = config;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build the graph for `area` and save it, replacing any existing file.
    pub fn rebuild(&self, area: &ServiceArea) -> Result<WalkGraph> {
        let graph = self.build(area)?;
        graph.save(&self.path)?;
        info!(
            path = %self.path.display(),
            nodes = graph.node_count(),
            "built walk graph"
        );
        Ok(graph)
    }

    #[cfg(feature = "download")]
    fn build(&self, area: &ServiceArea) -> Result<WalkGraph> {
        OverpassClient::new(self.overpass.clone())?.fetch_walk_graph(area)
    }

    #[cfg(not(feature = "download"))]
    fn build(&self, _area: &ServiceArea) -> Result<WalkGraph> {
        Err(RoadbookError::GraphLoad {
            path: self.path.clone(),
            reason: "building a graph requires the `download` feature".to_string(),
        })
    }
}

impl GraphProvider for GraphStore {
    type Graph = WalkGraph;

    fn provide(&self, origin: GeodeticPoint, destination: GeodeticPoint) -> Result<WalkGraph> {
        if self.path.exists() {
            match WalkGraph::load(&self.path) {
                Ok(graph) => {
                    info!(
                        path = %self.path.display(),
                        nodes = graph.node_count(),
                        "loaded walk graph"
                    );
                    return Ok(graph);
                }
                Err(err @ RoadbookError::GraphLoad { .. }) if self.rebuild_on_corrupt => {
                    warn!(error = %err, "rebuilding corrupt walk graph");
                }
                Err(err) => return Err(err),
            }
        }

        self.rebuild(&self.region.area(origin, destination))
    }
}

/// [`GraphProvider`] handing out a graph built in memory.
#[derive(Clone)]
pub struct Preloaded<G>(pub G);

impl<G: RoutingGraph + Clone> GraphProvider for Preloaded<G> {
    type Graph = G;

    fn provide(&self, _origin: GeodeticPoint, _destination: GeodeticPoint) -> Result<G> {
        Ok(self.0.clone())
    }
}
