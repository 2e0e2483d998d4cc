//! Walking-route facade.
//!
//! A [`WalkRoute`] ties an origin and a destination to a routing graph and
//! an elevation source. The graph is obtained on first use and kept for the
//! lifetime of the route.
//!
//! ```ignore
//! use roadbook::{GeodeticPoint, WalkRoute};
//!
//! let mut route = WalkRoute::builder(
//!     GeodeticPoint::new(68.358554, 18.779669),
//!     GeodeticPoint::new(68.286084, 18.590195),
//! )
//! .tile_dir("/data/nh_all")
//! .graph_file("/data/walk_route.json")
//! .build();
//!
//! let profile = route.profile()?;
//! println!("{:.1} km, +{:.0} m", profile.distance_km, profile.total_ascent);
//! ```

use std::path::{Path, PathBuf};

use moka::sync::Cache;
use tracing::{debug, info, warn};

use crate::coordinates::GeodeticPoint;
use crate::elevation::{
    ElevationService, ElevationServiceBuilder, RasterSource, DEFAULT_NODATA_THRESHOLD,
};
use crate::error::Result;
use crate::graph::{NodeId, Route, RoutingGraph};
use crate::profile::{build_profile, RouteProfile};
use crate::store::{GraphProvider, GraphRegion, GraphStore, DEFAULT_GRAPH_FILE};

/// Tile directory used when none is configured.
pub const DEFAULT_TILE_DIR: &str = "nh_all";

/// Number of node pairs whose shortest route is remembered.
const ROUTE_CACHE_CAPACITY: u64 = 64;

/// Lazily provided graph.
struct GraphSlot<P: GraphProvider> {
    provider: P,
    graph: Option<P::Graph>,
}

impl<P: GraphProvider> GraphSlot<P> {
    fn get(&mut self, origin: GeodeticPoint, destination: GeodeticPoint) -> Result<&P::Graph> {
        let graph = match self.graph.take() {
            Some(graph) => graph,
            None => {
                debug!("obtaining routing graph");
                self.provider.provide(origin, destination)?
            }
        };
        Ok(self.graph.insert(graph))
    }
}

/// A walk between two points and the data needed to profile it.
pub struct WalkRoute<P: GraphProvider = GraphStore, S = ElevationService> {
    origin: GeodeticPoint,
    destination: GeodeticPoint,
    slot: GraphSlot<P>,
    raster: S,
    routes: Cache<(NodeId, NodeId), Route>,
}

impl WalkRoute {
    /// Create a builder for a route backed by files on disk.
    pub fn builder(origin: GeodeticPoint, destination: GeodeticPoint) -> WalkRouteBuilder {
        WalkRouteBuilder::new(origin, destination)
    }

    /// Route configured from `ROADBOOK_*` environment variables.
    ///
    /// See [`ElevationServiceBuilder::from_env`] and [`GraphStore::from_env`].
    pub fn from_env(origin: GeodeticPoint, destination: GeodeticPoint) -> Result<Self> {
        let raster = ElevationServiceBuilder::from_env()?.build();
        Ok(Self::with_sources(origin, destination, GraphStore::from_env(), raster))
    }
}

impl<P: GraphProvider, S: RasterSource> WalkRoute<P, S> {
    /// Route using any graph provider and elevation source.
    pub fn with_sources(origin: GeodeticPoint, destination: GeodeticPoint, provider: P, raster: S) -> Self {
        Self {
            origin,
            destination,
            slot: GraphSlot {
                provider,
                graph: None,
            },
            raster,
            routes: Cache::new(ROUTE_CACHE_CAPACITY),
        }
    }

    pub fn origin(&self) -> GeodeticPoint {
        self.origin
    }

    pub fn destination(&self) -> GeodeticPoint {
        self.destination
    }

    /// Whether the routing graph has been obtained yet.
    pub fn is_loaded(&self) -> bool {
        self.slot.graph.is_some()
    }

    /// The routing graph, obtained from the provider on first call.
    pub fn graph(&mut self) -> Result<&P::Graph> {
        self.slot.get(self.origin, self.destination)
    }

    /// Graph node closest to `point`.
    pub fn nearest_node(&mut self, point: GeodeticPoint) -> Result<NodeId> {
        self.graph()?.nearest_node(point)
    }

    /// Nodes of the shortest walk from origin to destination.
    ///
    /// # Errors
    ///
    /// Returns [`RoadbookError::NoPath`](crate::RoadbookError::NoPath) if the
    /// two ends are not connected.
    pub fn shortest_path(&mut self) -> Result<Vec<NodeId>> {
        Ok(self.route()?.nodes)
    }

    /// Length in metres of the shortest walk from origin to destination.
    pub fn path_length(&mut self) -> Result<f64> {
        Ok(self.route()?.length_m)
    }

    /// Terrain elevations at the nodes of `path`, in path order.
    ///
    /// Nodes without a valid measurement are skipped, so the result can be
    /// shorter than `path`.
    pub fn elevations_along(&mut self, path: &[NodeId]) -> Result<Vec<f64>> {
        let graph = self.slot.get(self.origin, self.destination)?;

        let mut elevations = Vec::with_capacity(path.len());
        for &node in path {
            let projected = graph.node_coordinate(node)?.to_projected()?;
            match self.raster.sample(projected)? {
                Some(elevation) => elevations.push(elevation),
                None => debug!(%node, north = projected.north, east = projected.east, "no elevation"),
            }
        }

        let skipped = path.len() - elevations.len();
        if skipped > 0 {
            warn!(skipped, total = path.len(), "nodes without elevation skipped");
        }
        Ok(elevations)
    }

    /// Distance and elevation summary of the walk.
    ///
    /// Any failing stage aborts the whole computation.
    pub fn profile(&mut self) -> Result<RouteProfile> {
        let route = self.route()?;
        let elevations = self.elevations_along(&route.nodes)?;
        let profile = build_profile(route.length_m, &elevations)?;

        info!(
            distance_km = profile.distance_km,
            ascent = profile.total_ascent,
            descent = profile.total_descent,
            "route profile"
        );
        Ok(profile)
    }

    /// The walk as a GeoJSON feature with elevations and the profile.
    #[cfg(feature = "geojson")]
    pub fn route_geojson(&mut self) -> Result<geojson::Feature> {
        use crate::geojson::{add_elevations, route_feature, route_line};

        let profile = self.profile()?;
        let route = self.route()?;
        let line = route_line(self.graph()?, &route.nodes)?;
        let line = add_elevations(&self.raster, line)?;
        Ok(route_feature(line, &profile))
    }

    fn route(&mut self) -> Result<Route> {
        let from = self.nearest_node(self.origin)?;
        let to = self.nearest_node(self.destination)?;

        if let Some(route) = self.routes.get(&(from, to)) {
            return Ok(route);
        }

        let route = self.graph()?.shortest_route(from, to)?;
        debug!(
            %from,
            %to,
            nodes = route.nodes.len(),
            length_m = route.length_m,
            "shortest route"
        );
        self.routes.insert((from, to), route.clone());
        Ok(route)
    }
}

/// Builder for a file-backed [`WalkRoute`].
#[derive(Debug, Clone)]
pub struct WalkRouteBuilder {
    origin: GeodeticPoint,
    destination: GeodeticPoint,
    tile_dir: PathBuf,
    nodata_threshold: f64,
    graph_file: PathBuf,
    region: GraphRegion,
    rebuild_on_corrupt: bool,
}

impl WalkRouteBuilder {
    pub fn new(origin: GeodeticPoint, destination: GeodeticPoint) -> Self {
        Self {
            origin,
            destination,
            tile_dir: PathBuf::from(DEFAULT_TILE_DIR),
            nodata_threshold: DEFAULT_NODATA_THRESHOLD,
            graph_file: PathBuf::from(DEFAULT_GRAPH_FILE),
            region: GraphRegion::default(),
            rebuild_on_corrupt: false,
        }
    }

    /// Set the elevation tile directory.
    pub fn tile_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.tile_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the value below which elevation samples count as missing.
    pub fn nodata_threshold(mut self, threshold: f64) -> Self {
        self.nodata_threshold = threshold;
        self
    }

    /// Set the graph file.
    pub fn graph_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.graph_file = path.as_ref().to_path_buf();
        self
    }

    /// Set the area a missing graph file is built for.
    pub fn region(mut self, region: GraphRegion) -> Self {
        self.region = region;
        self
    }

    /// Replace an unreadable graph file instead of failing.
    pub fn rebuild_on_corrupt(mut self, rebuild: bool) -> Self {
        self.rebuild_on_corrupt = rebuild;
        self
    }

    pub fn build(self) -> WalkRoute {
        let raster = ElevationService::builder(&self.tile_dir)
            .nodata_threshold(self.nodata_threshold)
            .build();
        let store = GraphStore::new(&self.graph_file)
            .region(self.region)
            .rebuild_on_corrupt(self.rebuild_on_corrupt);
        WalkRoute::with_sources(self.origin, self.destination, store, raster)
    }
}
