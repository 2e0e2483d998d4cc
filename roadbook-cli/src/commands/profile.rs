use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, GeoJson};
use roadbook::{GeodeticPoint, GraphRegion, RouteProfile, WalkRoute};
use serde::Serialize;
use std::path::PathBuf;

pub struct Options {
    pub from: GeodeticPoint,
    pub to: GeodeticPoint,
    pub radius_km: Option<f64>,
    pub rebuild: bool,
    pub geojson: Option<PathBuf>,
    pub json: bool,
}

#[derive(Serialize)]
struct ProfileResponse {
    from: GeodeticPoint,
    to: GeodeticPoint,
    #[serde(flatten)]
    profile: RouteProfile,
    effort: f64,
    estimated_time_hours: f64,
}

pub fn run(
    tile_dir: PathBuf,
    graph_file: PathBuf,
    nodata_threshold: f64,
    options: Options,
) -> Result<()> {
    let region = match options.radius_km {
        Some(km) => GraphRegion::AroundMidpoint {
            radius_m: km * 1000.0,
        },
        None => GraphRegion::default(),
    };

    let mut route = WalkRoute::builder(options.from, options.to)
        .tile_dir(&tile_dir)
        .graph_file(&graph_file)
        .nodata_threshold(nodata_threshold)
        .region(region)
        .rebuild_on_corrupt(options.rebuild)
        .build();

    let profile = route
        .profile()
        .context("Failed to compute route profile")?;

    if let Some(path) = &options.geojson {
        let feature = route
            .route_geojson()
            .context("Failed to build route GeoJSON")?;
        std::fs::write(path, feature_collection(feature).to_string())
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if options.json {
        let response = ProfileResponse {
            from: options.from,
            to: options.to,
            profile,
            effort: profile.effort(),
            estimated_time_hours: profile.estimated_time_hours(),
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        println!("Distance:       {:.2} km", profile.distance_km);
        println!("Ascent:         +{:.0} m", profile.total_ascent);
        println!("Descent:        {:.0} m", profile.total_descent);
        println!("Highest point:  {:.0} m", profile.highest_point);
        println!("Lowest point:   {:.0} m", profile.lowest_point);
        println!("Effort:         {:.1}", profile.effort());
        println!(
            "Estimated time: {}",
            format_duration(profile.estimated_time_hours())
        );
    }

    Ok(())
}

/// Wrap the route in a collection, the form map viewers open directly.
fn feature_collection(feature: Feature) -> GeoJson {
    GeoJson::from(FeatureCollection {
        bbox: None,
        features: vec![feature],
        foreign_members: None,
    })
}

fn format_duration(hours: f64) -> String {
    let minutes = (hours * 60.0).round() as u64;
    format!("{} h {:02} min", minutes / 60, minutes % 60)
}
