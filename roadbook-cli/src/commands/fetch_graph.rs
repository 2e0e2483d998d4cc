use anyhow::{bail, Context, Result};
use roadbook::overpass::OverpassConfig;
use roadbook::{GraphStore, ServiceArea};
use std::path::PathBuf;

pub fn run(
    graph_file: PathBuf,
    north: Option<f64>,
    south: Option<f64>,
    east: Option<f64>,
    west: Option<f64>,
    endpoint: String,
) -> Result<()> {
    let default = ServiceArea::default();
    let area = ServiceArea::new(
        north.unwrap_or(default.north),
        south.unwrap_or(default.south),
        east.unwrap_or(default.east),
        west.unwrap_or(default.west),
    );
    if area.south >= area.north || area.west >= area.east {
        bail!(
            "Empty area: north={} south={} east={} west={}",
            area.north,
            area.south,
            area.east,
            area.west
        );
    }

    println!(
        "Downloading walk graph for {:.4},{:.4} to {:.4},{:.4}...",
        area.south, area.west, area.north, area.east
    );

    let graph = GraphStore::new(&graph_file)
        .overpass(OverpassConfig::default().with_endpoint(endpoint))
        .rebuild(&area)
        .context("Failed to build walk graph")?;

    println!(
        "Saved {} nodes and {} edges to {}",
        graph.node_count(),
        graph.edge_count(),
        graph_file.display()
    );

    Ok(())
}
