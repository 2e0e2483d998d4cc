//! Elevation tile naming.
//!
//! The elevation model is partitioned into 100 km × 100 km squares of the
//! SWEREF 99 TM grid. A tile is identified by its truncated northing and
//! easting in units of 100 km.
//!
//! # Filename Format
//!
//! Tiles follow the naming convention: `nh_{north_idx}_{east_idx}.tif`
//!
//! The indices give the **southwest corner** of the tile, so
//! `nh_75_6.tif` covers northings 7 500 000–7 600 000 and eastings
//! 600 000–700 000.

use std::path::{Path, PathBuf};

use crate::coordinates::ProjectedPoint;

/// Side length of a tile in metres.
pub const TILE_SIZE: f64 = 100_000.0;

/// Filename prefix of every elevation tile.
pub const TILE_PREFIX: &str = "nh";

/// Filename extension of every elevation tile.
pub const TILE_EXTENSION: &str = "tif";

/// Return the `(north_idx, east_idx)` of the tile containing `point`.
///
/// # Examples
///
/// ```
/// use roadbook::{tiling::tile_index, ProjectedPoint};
///
/// assert_eq!(tile_index(ProjectedPoint::new(7_587_572.0, 655_498.0)), (75, 6));
/// assert_eq!(tile_index(ProjectedPoint::new(7_500_000.0, 600_000.0)), (75, 6));
/// ```
pub fn tile_index(point: ProjectedPoint) -> (i32, i32) {
    (
        (point.north / TILE_SIZE).floor() as i32,
        (point.east / TILE_SIZE).floor() as i32,
    )
}

/// Return the tile filename for the given indices.
///
/// # Examples
///
/// ```
/// use roadbook::tiling::tile_filename;
///
/// assert_eq!(tile_filename(75, 6), "nh_75_6.tif");
/// ```
pub fn tile_filename(north_idx: i32, east_idx: i32) -> String {
    format!("{TILE_PREFIX}_{north_idx}_{east_idx}.{TILE_EXTENSION}")
}

/// Return the path of the tile file under `base_dir`.
pub fn tile_path(base_dir: &Path, north_idx: i32, east_idx: i32) -> PathBuf {
    base_dir.join(tile_filename(north_idx, east_idx))
}

/// Parse a tile filename to extract its indices.
///
/// Accepts a bare filename or a path, with or without the extension.
///
/// # Examples
///
/// ```
/// use roadbook::tiling::filename_to_tile_index;
///
/// assert_eq!(filename_to_tile_index("nh_75_6.tif"), Some((75, 6)));
/// assert_eq!(filename_to_tile_index("/data/nh_66_4.tif"), Some((66, 4)));
/// assert_eq!(filename_to_tile_index("dem_75_6.tif"), None);
/// ```
pub fn filename_to_tile_index(filename: &str) -> Option<(i32, i32)> {
    let name = Path::new(filename).file_name()?.to_str()?;
    let name = name
        .strip_suffix(TILE_EXTENSION)
        .and_then(|n| n.strip_suffix('.'))
        .unwrap_or(name);

    let mut parts = name.split('_');
    if parts.next()? != TILE_PREFIX {
        return None;
    }
    let north_idx = parts.next()?.parse().ok()?;
    let east_idx = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    Some((north_idx, east_idx))
}
