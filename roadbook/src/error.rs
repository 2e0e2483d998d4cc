//! Error types for the roadbook library.

use std::path::PathBuf;
use thiserror::Error;

use crate::graph::NodeId;

/// Errors that can occur while computing a walking-route profile.
///
/// Every stage of [`WalkRoute::profile`](crate::WalkRoute::profile) has its
/// own variant so that callers can tell which stage failed.
#[derive(Error, Debug)]
pub enum RoadbookError {
    /// IO error when reading or writing files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input outside the valid extent of the SWEREF 99 TM projection.
    #[error("Cannot transform coordinates ({x}, {y}): {reason}")]
    CoordinateTransform { x: f64, y: f64, reason: &'static str },

    /// No elevation tile exists for the computed tile index.
    #[error("Elevation tile not found: {path}")]
    TileNotFound { path: PathBuf },

    /// The sampled point lies outside the raster coverage of its tile.
    #[error("Point (north={north}, east={east}) is outside the raster coverage of {path}")]
    RasterSample {
        north: f64,
        east: f64,
        path: PathBuf,
    },

    /// The tile exists but is not a usable GeoTIFF.
    #[error("Failed to decode elevation tile {path}: {reason}")]
    RasterDecode { path: PathBuf, reason: String },

    /// A profile was requested with no valid elevation samples.
    #[error("No valid elevation samples along the route")]
    EmptyElevationSeries,

    /// Origin and destination are not connected in the routing graph.
    #[error("No path between node {from} and node {to}")]
    NoPath { from: NodeId, to: NodeId },

    /// The routing graph has no nodes to snap to.
    #[error("Routing graph is empty")]
    EmptyGraph,

    /// The node does not belong to the routing graph.
    #[error("Unknown graph node {0}")]
    UnknownNode(NodeId),

    /// An edge length that is negative or not finite.
    #[error("Invalid length {length_m} for edge {from} -> {to}")]
    InvalidEdgeLength {
        from: NodeId,
        to: NodeId,
        length_m: f64,
    },

    /// The graph file is missing or corrupt.
    #[error("Failed to load walk graph from {path}: {reason}")]
    GraphLoad { path: PathBuf, reason: String },

    /// Downloading the pedestrian network failed.
    #[cfg(feature = "download")]
    #[error("Failed to download walk graph: {reason}")]
    GraphDownload { reason: String },
}

/// Result type alias using [`RoadbookError`].
pub type Result<T> = std::result::Result<T, RoadbookError>;

#[cfg(feature = "download")]
impl From<reqwest::Error> for RoadbookError {
    fn from(err: reqwest::Error) -> Self {
        RoadbookError::GraphDownload {
            reason: err.to_string(),
        }
    }
}
