//! Pedestrian network download from the Overpass API.
//!
//! Only available with the `download` feature. The query selects every way
//! a walker may use inside a [`ServiceArea`] together with its nodes, and
//! each consecutive node pair of a way becomes a footway in both directions.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::coordinates::GeodeticPoint;
use crate::error::{Result, RoadbookError};
use crate::graph::{NodeId, WalkGraph};
use crate::store::ServiceArea;

/// Public Overpass instance.
pub const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// Default timeout for HTTP requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Ways a pedestrian can walk on: any `highway` that is not private,
/// not closed to foot traffic and not a motorway, cycleway or planned road.
pub const WALK_FILTER: &str = concat!(
    r#"["highway"]["area"!~"yes"]["access"!~"private"]"#,
    r#"["highway"!~"abandoned|bus_guideway|construction|cycleway|motor|no|planned|platform|proposed|raceway|razed"]"#,
    r#"["foot"!~"no"]["service"!~"private"]"#,
);

/// Configuration for downloading the walk graph.
#[derive(Debug, Clone)]
pub struct OverpassConfig {
    /// Interpreter URL.
    pub endpoint: String,
    /// Tag filter applied to ways.
    pub walk_filter: String,
    /// Request timeout in seconds, also sent as the query timeout.
    pub timeout_secs: u64,
    /// Number of retry attempts on failure.
    pub max_retries: u32,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            walk_filter: WALK_FILTER.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: 3,
        }
    }
}

impl OverpassConfig {
    /// Use another Overpass instance.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Replace the way tag filter.
    pub fn with_walk_filter(mut self, filter: impl Into<String>) -> Self {
        self.walk_filter = filter.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the maximum number of retry attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Overpass QL selecting the walkable ways in `area` and their nodes.
    pub fn query(&self, area: &ServiceArea) -> String {
        format!(
            "[out:json][timeout:{}];(way{}({},{},{},{});>;);out;",
            self.timeout_secs, self.walk_filter, area.south, area.west, area.north, area.east
        )
    }
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Element {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
    },
    Way {
        #[serde(default)]
        nodes: Vec<i64>,
    },
    #[serde(other)]
    Other,
}

/// Build a [`WalkGraph`] from an Overpass JSON response body.
///
/// Way references to nodes missing from the response are skipped.
pub fn parse_walk_graph(body: &str) -> Result<WalkGraph> {
    let response: OverpassResponse =
        serde_json::from_str(body).map_err(|e| RoadbookError::GraphDownload {
            reason: format!("Invalid Overpass response: {}", e),
        })?;
    Ok(graph_from_elements(response.elements))
}

fn graph_from_elements(elements: Vec<Element>) -> WalkGraph {
    let mut positions = HashMap::new();
    let mut ways = Vec::new();
    for element in elements {
        match element {
            Element::Node { id, lat, lon } => {
                positions.insert(id, GeodeticPoint::new(lat, lon));
            }
            Element::Way { nodes } => ways.push(nodes),
            Element::Other => {}
        }
    }

    let mut graph = WalkGraph::new();
    let mut ids: HashMap<i64, NodeId> = HashMap::new();
    let mut missing = 0usize;

    for way in &ways {
        for pair in way.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a == b {
                continue;
            }
            let (Some(&pa), Some(&pb)) = (positions.get(&a), positions.get(&b)) else {
                missing += 1;
                continue;
            };
            let na = *ids.entry(a).or_insert_with(|| graph.add_node(a, pa));
            let nb = *ids.entry(b).or_insert_with(|| graph.add_node(b, pb));
            if let Err(err) = graph.add_footway(na, nb) {
                warn!(error = %err, "skipping way segment");
            }
        }
    }

    if missing > 0 {
        debug!(missing, "way segments referencing absent nodes skipped");
    }
    debug!(
        ways = ways.len(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "parsed Overpass response"
    );
    graph
}

/// Blocking Overpass API client.
pub struct OverpassClient {
    client: Client,
    config: OverpassConfig,
}

impl OverpassClient {
    /// Create a new client with the given configuration.
    pub fn new(config: OverpassConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RoadbookError::GraphDownload {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    /// Download the walkable network inside `area`.
    pub fn fetch_walk_graph(&self, area: &ServiceArea) -> Result<WalkGraph> {
        let query = self.config.query(area);
        info!(endpoint = %self.config.endpoint, ?area, "downloading walk graph");

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                std::thread::sleep(Duration::from_millis(500 * attempt as u64));
            }

            match self.do_fetch(&query) {
                Ok(body) => return parse_walk_graph(&body),
                Err(e) => {
                    warn!(attempt, error = %e, "Overpass request failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| RoadbookError::GraphDownload {
            reason: "Unknown error".to_string(),
        }))
    }

    fn do_fetch(&self, query: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .form(&[("data", query)])
            .send()?;

        if !response.status().is_success() {
            return Err(RoadbookError::GraphDownload {
                reason: format!("HTTP {}", response.status()),
            });
        }

        Ok(response.text()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RoutingGraph;

    const RESPONSE: &str = r#"{
        "version": 0.6,
        "elements": [
            {"type": "way", "id": 100, "nodes": [1, 2, 3], "tags": {"highway": "path"}},
            {"type": "way", "id": 101, "nodes": [3, 3, 4, 99]},
            {"type": "node", "id": 1, "lat": 68.3500, "lon": 18.8000},
            {"type": "node", "id": 2, "lat": 68.3510, "lon": 18.8000},
            {"type": "node", "id": 3, "lat": 68.3520, "lon": 18.8000},
            {"type": "node", "id": 4, "lat": 68.3520, "lon": 18.8100, "tags": {"tourism": "alpine_hut"}},
            {"type": "relation", "id": 7, "members": []}
        ]
    }"#;

    #[test]
    fn test_query() {
        let query = OverpassConfig::default().query(&ServiceArea::new(68.4, 65.7, 19.1, 14.8));
        assert!(query.starts_with("[out:json][timeout:300];(way[\"highway\"]"));
        assert!(query.contains("[\"foot\"!~\"no\"]"));
        assert!(query.ends_with("(65.7,14.8,68.4,19.1);>;);out;"));
    }

    #[test]
    fn test_parse_walk_graph() {
        let graph = parse_walk_graph(RESPONSE).unwrap();

        assert_eq!(graph.node_count(), 4);
        // 1-2, 2-3, 3-4 in both directions
        assert_eq!(graph.edge_count(), 6);

        let start = graph.nearest_node(GeodeticPoint::new(68.3500, 18.8000)).unwrap();
        let end = graph.nearest_node(GeodeticPoint::new(68.3520, 18.8100)).unwrap();
        assert_eq!(graph.osm_id(start).unwrap(), 1);
        assert_eq!(graph.osm_id(end).unwrap(), 4);
        assert_eq!(graph.shortest_path(start, end).unwrap().len(), 4);
    }

    #[test]
    fn test_parse_invalid_response() {
        let result = parse_walk_graph("<html>rate limited</html>");
        assert!(matches!(result, Err(RoadbookError::GraphDownload { .. })));
    }

    #[test]
    fn test_config_builders() {
        let config = OverpassConfig::default()
            .with_endpoint("http://localhost:12345/api/interpreter")
            .with_timeout(10)
            .with_max_retries(0);
        assert_eq!(config.endpoint, "http://localhost:12345/api/interpreter");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.max_retries, 0);
    }
}
