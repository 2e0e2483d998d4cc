use anyhow::Result;
use roadbook::tiling::{filename_to_tile_index, TILE_SIZE};
use roadbook::ElevationService;
use std::fs;
use std::path::PathBuf;

pub fn run(tile_dir: PathBuf) -> Result<()> {
    let service = ElevationService::new(&tile_dir);
    let tiles = service.scan_tile_files();

    if tiles.is_empty() {
        println!("No nh_*.tif files found in: {}", tile_dir.display());
        return Ok(());
    }

    let mut total_size: u64 = 0;

    println!("{:<16} {:>22} {:>20} {:>12}", "TILE", "NORTHING", "EASTING", "SIZE");
    println!("{}", "-".repeat(73));

    for name in &tiles {
        let size = fs::metadata(tile_dir.join(name))
            .map(|m| m.len())
            .unwrap_or(0);
        total_size += size;

        let (northing, easting) = match filename_to_tile_index(name) {
            Some((n, e)) => (coverage(n), coverage(e)),
            None => ("?".to_string(), "?".to_string()),
        };

        println!(
            "{:<16} {:>22} {:>20} {:>12}",
            name,
            northing,
            easting,
            format_size(size)
        );
    }

    println!();
    println!("Summary:");
    println!("  Total tiles: {}", tiles.len());
    println!("  Total size: {}", format_size(total_size));
    println!("  Tile directory: {}", tile_dir.display());

    Ok(())
}

/// Metre range of one tile index.
fn coverage(index: i32) -> String {
    let start = index as f64 * TILE_SIZE;
    format!("{:.0}-{:.0}", start, start + TILE_SIZE)
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
