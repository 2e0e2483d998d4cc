//! Pedestrian routing graph.
//!
//! [`RoutingGraph`] is the narrow capability the route facade needs from a
//! graph. [`WalkGraph`] implements it on top of a petgraph directed
//! multigraph whose nodes carry OpenStreetMap coordinates and whose edges
//! carry lengths in metres.
//!
//! # File Format
//!
//! [`WalkGraph::save`] writes JSON:
//!
//! ```text
//! {"format": "roadbook-walk-graph/1", "graph": {"nodes": [...], "edges": [...], ...}}
//! ```
//!
//! where `graph` is petgraph's serde representation. Coordinates and
//! lengths are stored as `f64` and round-trip exactly.

use std::cell::OnceCell;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use geo::{HaversineDistance, Point};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coordinates::GeodeticPoint;
use crate::error::{Result, RoadbookError};

/// Format marker written at the top of every graph file.
pub const GRAPH_FORMAT: &str = "roadbook-walk-graph/1";

/// Handle of a node in a [`RoutingGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One shortest-path search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    /// Nodes from origin to destination, both included.
    pub nodes: Vec<NodeId>,
    /// Sum of edge lengths in metres.
    pub length_m: f64,
}

/// What the route facade needs from a routing graph.
pub trait RoutingGraph {
    /// Node closest to `point`.
    fn nearest_node(&self, point: GeodeticPoint) -> Result<NodeId>;

    /// Nodes of the shortest path by edge length.
    fn shortest_path(&self, from: NodeId, to: NodeId) -> Result<Vec<NodeId>>;

    /// Length in metres of the shortest path by edge length.
    fn path_length(&self, from: NodeId, to: NodeId) -> Result<f64>;

    /// Stored position of `node`.
    fn node_coordinate(&self, node: NodeId) -> Result<GeodeticPoint>;

    /// Both the path and its length.
    ///
    /// The default runs two searches; implementations that get both from
    /// one search should override it.
    fn shortest_route(&self, from: NodeId, to: NodeId) -> Result<Route> {
        Ok(Route {
            nodes: self.shortest_path(from, to)?,
            length_m: self.path_length(from, to)?,
        })
    }
}

/// Node payload: an OpenStreetMap node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkNode {
    pub osm_id: i64,
    pub lon: f64,
    pub lat: f64,
}

/// Edge payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkEdge {
    /// Length in metres.
    pub length_m: f64,
}

type IndexedNode = GeomWithData<[f64; 2], NodeIndex>;

/// Nearest-node index over equirectangular coordinates.
///
/// Longitudes are scaled by the cosine of the mean latitude so that
/// Euclidean distance approximates ground distance within one region.
#[derive(Clone)]
struct SpatialIndex {
    tree: RTree<IndexedNode>,
    lon_scale: f64,
}

impl SpatialIndex {
    fn build(graph: &DiGraph<WalkNode, WalkEdge>) -> Self {
        let count = graph.node_count().max(1) as f64;
        let mean_lat = graph.node_weights().map(|n| n.lat).sum::<f64>() / count;
        let lon_scale = mean_lat.to_radians().cos();

        let points = graph
            .node_indices()
            .map(|idx| {
                let node = &graph[idx];
                GeomWithData::new([node.lon * lon_scale, node.lat], idx)
            })
            .collect();

        Self {
            tree: RTree::bulk_load(points),
            lon_scale,
        }
    }

    fn nearest(&self, point: GeodeticPoint) -> Option<NodeIndex> {
        self.tree
            .nearest_neighbor(&[point.lon * self.lon_scale, point.lat])
            .map(|entry| entry.data)
    }
}

#[derive(Serialize)]
struct GraphFileRef<'a> {
    format: &'a str,
    graph: &'a DiGraph<WalkNode, WalkEdge>,
}

#[derive(Deserialize)]
struct GraphFile {
    format: String,
    graph: DiGraph<WalkNode, WalkEdge>,
}

/// A pedestrian network.
///
/// # Example
///
/// ```
/// use roadbook::{GeodeticPoint, RoutingGraph, WalkGraph};
///
/// let mut graph = WalkGraph::new();
/// let a = graph.add_node(1, GeodeticPoint::new(68.3500, 18.8000));
/// let b = graph.add_node(2, GeodeticPoint::new(68.3510, 18.8000));
/// graph.add_footway(a, b).unwrap();
///
/// let route = graph.shortest_route(a, b).unwrap();
/// assert_eq!(route.nodes, vec![a, b]);
/// assert!((route.length_m - 111.2).abs() < 0.5);
/// ```
#[derive(Default, Clone)]
pub struct WalkGraph {
    graph: DiGraph<WalkNode, WalkEdge>,
    /// Built on the first nearest-node query, reset by any mutation.
    index: OnceCell<SpatialIndex>,
}

impl WalkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node at `point`.
    pub fn add_node(&mut self, osm_id: i64, point: GeodeticPoint) -> NodeId {
        self.index = OnceCell::new();
        let idx = self.graph.add_node(WalkNode {
            osm_id,
            lon: point.lon,
            lat: point.lat,
        });
        NodeId(idx.index())
    }

    /// Add a one-way edge of `length_m` metres. Parallel edges are allowed.
    ///
    /// # Errors
    ///
    /// Returns [`RoadbookError::InvalidEdgeLength`] if `length_m` is
    /// negative or not finite.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, length_m: f64) -> Result<()> {
        let (a, b) = (self.index_of(from)?, self.index_of(to)?);
        if !is_valid_length(length_m) {
            return Err(RoadbookError::InvalidEdgeLength { from, to, length_m });
        }
        self.graph.add_edge(a, b, WalkEdge { length_m });
        Ok(())
    }

    /// Connect two nodes in both directions with their great-circle
    /// distance as length.
    ///
    /// Returns the length in metres.
    pub fn add_footway(&mut self, a: NodeId, b: NodeId) -> Result<f64> {
        let length_m = self.point(a)?.haversine_distance(&self.point(b)?);
        self.add_edge(a, b, length_m)?;
        self.add_edge(b, a, length_m)?;
        Ok(length_m)
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// OpenStreetMap id of `node`.
    pub fn osm_id(&self, node: NodeId) -> Result<i64> {
        Ok(self.graph[self.index_of(node)?].osm_id)
    }

    /// Write the graph to `path` as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(path)?);
        let file = GraphFileRef {
            format: GRAPH_FORMAT,
            graph: &self.graph,
        };
        serde_json::to_writer(&mut writer, &file).map_err(std::io::Error::from)?;
        writer.flush()?;

        debug!(
            path = %path.display(),
            nodes = self.node_count(),
            edges = self.edge_count(),
            "saved walk graph"
        );
        Ok(())
    }

    /// Read a graph written by [`WalkGraph::save`].
    ///
    /// # Errors
    ///
    /// Returns [`RoadbookError::GraphLoad`] if the file is missing, is not a
    /// graph file, or holds invalid coordinates or lengths.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let load_err = |reason: String| RoadbookError::GraphLoad {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| load_err(e.to_string()))?;
        let GraphFile { format, graph } = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| load_err(e.to_string()))?;

        if format != GRAPH_FORMAT {
            return Err(load_err(format!("unsupported graph format {format:?}")));
        }
        if let Some(node) = graph
            .node_weights()
            .find(|n| !n.lat.is_finite() || !n.lon.is_finite())
        {
            return Err(load_err(format!("node {} has an invalid position", node.osm_id)));
        }
        if graph
            .edge_weights()
            .any(|e| !is_valid_length(e.length_m))
        {
            return Err(load_err("edge with an invalid length".to_string()));
        }

        debug!(
            path = %path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "loaded walk graph"
        );
        Ok(Self {
            graph,
            index: OnceCell::new(),
        })
    }

    fn index_of(&self, node: NodeId) -> Result<NodeIndex> {
        let idx = NodeIndex::new(node.0);
        if self.graph.node_weight(idx).is_some() {
            Ok(idx)
        } else {
            Err(RoadbookError::UnknownNode(node))
        }
    }

    fn point(&self, node: NodeId) -> Result<Point<f64>> {
        let WalkNode { lon, lat, .. } = self.graph[self.index_of(node)?];
        Ok(Point::new(lon, lat))
    }

    fn search(&self, from: NodeId, to: NodeId) -> Result<Route> {
        let (start, goal) = (self.index_of(from)?, self.index_of(to)?);

        let (length_m, path) = petgraph::algo::astar(
            &self.graph,
            start,
            |n| n == goal,
            |e| e.weight().length_m,
            |_| 0.0,
        )
        .ok_or(RoadbookError::NoPath { from, to })?;

        Ok(Route {
            nodes: path.into_iter().map(|idx| NodeId(idx.index())).collect(),
            length_m,
        })
    }
}

/// Edge lengths must be finite and non-negative for the search to be exact.
fn is_valid_length(length_m: f64) -> bool {
    length_m.is_finite() && length_m >= 0.0
}

impl RoutingGraph for WalkGraph {
    fn nearest_node(&self, point: GeodeticPoint) -> Result<NodeId> {
        self.index
            .get_or_init(|| SpatialIndex::build(&self.graph))
            .nearest(point)
            .map(|idx| NodeId(idx.index()))
            .ok_or(RoadbookError::EmptyGraph)
    }

    fn shortest_path(&self, from: NodeId, to: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.search(from, to)?.nodes)
    }

    fn path_length(&self, from: NodeId, to: NodeId) -> Result<f64> {
        Ok(self.search(from, to)?.length_m)
    }

    fn node_coordinate(&self, node: NodeId) -> Result<GeodeticPoint> {
        let WalkNode { lat, lon, .. } = self.graph[self.index_of(node)?];
        Ok(GeodeticPoint { lat, lon })
    }

    fn shortest_route(&self, from: NodeId, to: NodeId) -> Result<Route> {
        self.search(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    /// ```text
    ///  a --100-- b --100-- c
    ///  |                   |
    ///  +-------500---------+        d --50-- e
    /// ```
    fn sample_graph() -> (WalkGraph, [NodeId; 5]) {
        let mut graph = WalkGraph::new();
        let a = graph.add_node(10, GeodeticPoint::new(68.350, 18.80));
        let b = graph.add_node(11, GeodeticPoint::new(68.351, 18.80));
        let c = graph.add_node(12, GeodeticPoint::new(68.352, 18.80));
        let d = graph.add_node(13, GeodeticPoint::new(68.400, 18.90));
        let e = graph.add_node(14, GeodeticPoint::new(68.401, 18.90));

        for (from, to, length) in [(a, b, 100.0), (b, c, 100.0), (a, c, 500.0), (d, e, 50.0)] {
            graph.add_edge(from, to, length).unwrap();
            graph.add_edge(to, from, length).unwrap();
        }

        (graph, [a, b, c, d, e])
    }

    #[test]
    fn test_shortest_path_by_length() {
        let (graph, [a, b, c, ..]) = sample_graph();

        assert_eq!(graph.shortest_path(a, c).unwrap(), vec![a, b, c]);
        assert_relative_eq!(graph.path_length(a, c).unwrap(), 200.0);
    }

    #[test]
    fn test_length_is_weighted_not_hops() {
        let mut graph = WalkGraph::new();
        let a = graph.add_node(1, GeodeticPoint::new(68.0, 18.0));
        let b = graph.add_node(2, GeodeticPoint::new(68.0, 18.1));
        let c = graph.add_node(3, GeodeticPoint::new(68.0, 18.2));
        graph.add_edge(a, c, 900.0).unwrap();
        graph.add_edge(a, b, 300.0).unwrap();
        graph.add_edge(b, c, 350.0).unwrap();

        let route = graph.shortest_route(a, c).unwrap();
        assert_eq!(route.nodes, vec![a, b, c]);
        assert_relative_eq!(route.length_m, 650.0);
    }

    #[test]
    fn test_parallel_edges_use_shortest() {
        let mut graph = WalkGraph::new();
        let a = graph.add_node(1, GeodeticPoint::new(68.0, 18.0));
        let b = graph.add_node(2, GeodeticPoint::new(68.0, 18.1));
        graph.add_edge(a, b, 80.0).unwrap();
        graph.add_edge(a, b, 60.0).unwrap();

        assert_relative_eq!(graph.path_length(a, b).unwrap(), 60.0);
    }

    #[test]
    fn test_invalid_edge_length() {
        let mut graph = WalkGraph::new();
        let a = graph.add_node(1, GeodeticPoint::new(68.0, 18.0));
        let b = graph.add_node(2, GeodeticPoint::new(68.0, 18.1));

        for length in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                graph.add_edge(a, b, length),
                Err(RoadbookError::InvalidEdgeLength { from, to, .. }) if from == a && to == b
            ));
        }
        assert_eq!(graph.edge_count(), 0);

        graph.add_edge(a, b, 0.0).unwrap();
        assert_eq!(graph.path_length(a, b).unwrap(), 0.0);
    }

    #[test]
    fn test_one_way_edges() {
        let mut graph = WalkGraph::new();
        let a = graph.add_node(1, GeodeticPoint::new(68.0, 18.0));
        let b = graph.add_node(2, GeodeticPoint::new(68.0, 18.1));
        graph.add_edge(a, b, 10.0).unwrap();

        assert!(graph.shortest_path(a, b).is_ok());
        assert!(matches!(
            graph.shortest_path(b, a),
            Err(RoadbookError::NoPath { .. })
        ));
    }

    #[test]
    fn test_same_node() {
        let (graph, [a, ..]) = sample_graph();

        let route = graph.shortest_route(a, a).unwrap();
        assert_eq!(route.nodes, vec![a]);
        assert_eq!(route.length_m, 0.0);
    }

    #[test]
    fn test_disconnected_components() {
        let (graph, [a, _, _, d, _]) = sample_graph();

        match graph.shortest_path(a, d) {
            Err(RoadbookError::NoPath { from, to }) => {
                assert_eq!((from, to), (a, d));
            }
            other => panic!("Expected NoPath, got {other:?}"),
        }
        assert!(matches!(
            graph.path_length(a, d),
            Err(RoadbookError::NoPath { .. })
        ));
    }

    #[test]
    fn test_nearest_node() {
        let (graph, [a, b, c, d, e]) = sample_graph();

        assert_eq!(graph.nearest_node(GeodeticPoint::new(68.3501, 18.8001)).unwrap(), a);
        assert_eq!(graph.nearest_node(GeodeticPoint::new(68.3512, 18.7990)).unwrap(), b);
        assert_eq!(graph.nearest_node(GeodeticPoint::new(68.3600, 18.8000)).unwrap(), c);
        assert_eq!(graph.nearest_node(GeodeticPoint::new(68.3990, 18.9100)).unwrap(), d);
        assert_eq!(graph.nearest_node(GeodeticPoint::new(68.5000, 19.0000)).unwrap(), e);
    }

    #[test]
    fn test_nearest_node_after_mutation() {
        let (mut graph, [a, ..]) = sample_graph();
        let target = GeodeticPoint::new(68.3495, 18.8000);
        assert_eq!(graph.nearest_node(target).unwrap(), a);

        let f = graph.add_node(15, target);
        assert_eq!(graph.nearest_node(target).unwrap(), f);
    }

    #[test]
    fn test_nearest_node_empty_graph() {
        let graph = WalkGraph::new();
        assert!(matches!(
            graph.nearest_node(GeodeticPoint::new(68.0, 18.0)),
            Err(RoadbookError::EmptyGraph)
        ));
    }

    #[test]
    fn test_unknown_node() {
        let (graph, [a, ..]) = sample_graph();

        assert!(matches!(
            graph.node_coordinate(NodeId(99)),
            Err(RoadbookError::UnknownNode(NodeId(99)))
        ));
        assert!(matches!(
            graph.shortest_path(a, NodeId(99)),
            Err(RoadbookError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_node_coordinate() {
        let (graph, [a, ..]) = sample_graph();
        assert_eq!(graph.node_coordinate(a).unwrap(), GeodeticPoint::new(68.350, 18.80));
        assert_eq!(graph.osm_id(a).unwrap(), 10);
    }

    #[test]
    fn test_add_footway() {
        let mut graph = WalkGraph::new();
        let a = graph.add_node(1, GeodeticPoint::new(68.0, 18.0));
        let b = graph.add_node(2, GeodeticPoint::new(68.01, 18.0));

        let length = graph.add_footway(a, b).unwrap();
        // 0.01° of latitude
        assert_relative_eq!(length, 1111.95, epsilon = 0.1);
        assert_eq!(graph.edge_count(), 2);
        assert_relative_eq!(graph.path_length(b, a).unwrap(), length);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graphs").join("walk_route.json");
        let (graph, [a, _, c, ..]) = sample_graph();

        graph.save(&path).unwrap();
        let loaded = WalkGraph::load(&path).unwrap();

        assert_eq!(loaded.node_count(), graph.node_count());
        assert_eq!(loaded.edge_count(), graph.edge_count());
        assert_eq!(loaded.shortest_route(a, c).unwrap(), graph.shortest_route(a, c).unwrap());
        assert_eq!(loaded.node_coordinate(c).unwrap(), graph.node_coordinate(c).unwrap());
        assert_eq!(loaded.osm_id(c).unwrap(), 12);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = WalkGraph::load(dir.path().join("missing.json"));
        assert!(matches!(result, Err(RoadbookError::GraphLoad { .. })));
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("walk_route.json");

        std::fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            WalkGraph::load(&path),
            Err(RoadbookError::GraphLoad { .. })
        ));

        std::fs::write(&path, br#"{"format": "other/1", "graph": null}"#).unwrap();
        assert!(matches!(
            WalkGraph::load(&path),
            Err(RoadbookError::GraphLoad { .. })
        ));
    }
}
