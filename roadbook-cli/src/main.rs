use anyhow::Result;
use clap::{Parser, Subcommand};
use roadbook::overpass::DEFAULT_ENDPOINT;
use roadbook::store::DEFAULT_GRAPH_FILE;
use roadbook::GeodeticPoint;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::parse_point;

/// Walking-route profiles for the Swedish mountains
#[derive(Parser)]
#[command(name = "road-book")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing nh_*.tif elevation tiles
    #[arg(short, long, env = "ROADBOOK_TILE_DIR", global = true)]
    tile_dir: Option<PathBuf>,

    /// Walk graph file, built on first use if missing
    #[arg(
        short,
        long,
        env = "ROADBOOK_GRAPH_FILE",
        default_value = DEFAULT_GRAPH_FILE,
        global = true
    )]
    graph_file: PathBuf,

    /// Elevation samples below this are treated as missing
    #[arg(
        long,
        env = "ROADBOOK_NODATA_THRESHOLD",
        default_value_t = roadbook::elevation::DEFAULT_NODATA_THRESHOLD,
        allow_negative_numbers = true,
        global = true
    )]
    nodata_threshold: f64,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Distance, climb and walking time between two points
    Profile {
        /// Start point as LAT,LON
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        from: GeodeticPoint,

        /// End point as LAT,LON
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        to: GeodeticPoint,

        /// Build a missing graph around the route midpoint with this radius
        /// instead of the whole Abisko-Hemavan area
        #[arg(long)]
        radius_km: Option<f64>,

        /// Replace an unreadable graph file instead of failing
        #[arg(long)]
        rebuild: bool,

        /// Write the route as a GeoJSON feature to this file
        #[arg(long)]
        geojson: Option<PathBuf>,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Terrain elevation at a single point
    Elevation {
        #[command(flatten)]
        location: commands::LocationArgs,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Convert between WGS84 degrees and SWEREF 99 TM metres
    Convert {
        #[command(flatten)]
        location: commands::LocationArgs,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List available elevation tiles
    Tiles,

    /// Download the walk graph from OpenStreetMap and save it
    FetchGraph {
        /// Northern edge in degrees (default: Abisko)
        #[arg(long)]
        north: Option<f64>,

        /// Southern edge in degrees (default: Hemavan)
        #[arg(long)]
        south: Option<f64>,

        /// Eastern edge in degrees
        #[arg(long)]
        east: Option<f64>,

        /// Western edge in degrees
        #[arg(long)]
        west: Option<f64>,

        /// Overpass API interpreter URL
        #[arg(long, env = "ROADBOOK_OVERPASS_URL", default_value = DEFAULT_ENDPOINT)]
        endpoint: String,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("roadbook=debug,road_book=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "roadbook=warn".into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Profile {
            from,
            to,
            radius_km,
            rebuild,
            geojson,
            json,
        } => commands::profile::run(
            commands::tile_dir(cli.tile_dir)?,
            cli.graph_file,
            cli.nodata_threshold,
            commands::profile::Options {
                from,
                to,
                radius_km,
                rebuild,
                geojson,
                json,
            },
        ),
        Commands::Elevation { location, json } => commands::elevation::run(
            commands::tile_dir(cli.tile_dir)?,
            cli.nodata_threshold,
            location.resolve()?,
            json,
        ),
        Commands::Convert { location, json } => commands::convert::run(location.resolve()?, json),
        Commands::Tiles => commands::tiles::run(commands::tile_dir(cli.tile_dir)?),
        Commands::FetchGraph {
            north,
            south,
            east,
            west,
            endpoint,
        } => commands::fetch_graph::run(cli.graph_file, north, south, east, west, endpoint),
    }
}
