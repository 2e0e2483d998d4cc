//! Elevation lookup over a directory of tiles.
//!
//! [`ElevationQuery`] resolves one projected point to its tile and samples
//! it. [`ElevationService`] wraps a tile directory and a nodata threshold and
//! implements [`RasterSource`], the narrow interface the route facade
//! depends on.
//!
//! Every lookup opens its tile, samples it and drops it again. There is no
//! tile cache: routes touch only a handful of tiles.
//!
//! ```ignore
//! use roadbook::{ElevationService, ProjectedPoint, RasterSource};
//!
//! let service = ElevationService::new("/data/nh_all");
//! match service.sample(ProjectedPoint::new(7_587_572.0, 655_498.0))? {
//!     Some(elevation) => println!("Elevation: {elevation:.1}m"),
//!     None => println!("no data"),
//! }
//! ```

use std::path::{Path, PathBuf};

use tracing::trace;

use crate::coordinates::ProjectedPoint;
use crate::error::{Result, RoadbookError};
use crate::tile::ElevationTile;
use crate::tiling::{filename_to_tile_index, tile_index, tile_path};

/// Values below this are fill values (sea, outside the survey), not
/// measurements.
pub const DEFAULT_NODATA_THRESHOLD: f64 = -100.0;

/// Environment variable holding the tile directory.
pub const TILE_DIR_ENV: &str = "ROADBOOK_TILE_DIR";

/// Environment variable overriding [`DEFAULT_NODATA_THRESHOLD`].
pub const NODATA_THRESHOLD_ENV: &str = "ROADBOOK_NODATA_THRESHOLD";

/// Something that can report the terrain elevation at a projected point.
pub trait RasterSource {
    /// Elevation in metres at `point`.
    ///
    /// Returns `Ok(None)` when the raster holds no valid measurement there.
    fn sample(&self, point: ProjectedPoint) -> Result<Option<f64>>;
}

impl<S: RasterSource + ?Sized> RasterSource for &S {
    fn sample(&self, point: ProjectedPoint) -> Result<Option<f64>> {
        (**self).sample(point)
    }
}

/// A projected point bound to the tile directory it is looked up in.
#[derive(Debug, Clone)]
pub struct ElevationQuery<'a> {
    point: ProjectedPoint,
    tile_dir: &'a Path,
}

impl<'a> ElevationQuery<'a> {
    pub fn new(point: ProjectedPoint, tile_dir: &'a Path) -> Self {
        Self { point, tile_dir }
    }

    /// `(north_idx, east_idx)` of the tile containing the point.
    pub fn tile_index(&self) -> (i32, i32) {
        tile_index(self.point)
    }

    /// Path of the tile containing the point.
    pub fn tile_path(&self) -> PathBuf {
        let (north_idx, east_idx) = self.tile_index();
        tile_path(self.tile_dir, north_idx, east_idx)
    }

    /// Raw first-band value at the point.
    ///
    /// The value is returned as stored, nodata fill included.
    ///
    /// # Errors
    ///
    /// - [`RoadbookError::TileNotFound`] if the tile file does not exist
    /// - [`RoadbookError::RasterSample`] if the point is outside its raster
    /// - [`RoadbookError::RasterDecode`] if the file cannot be decoded
    pub fn elevation(&self) -> Result<f64> {
        Ok(self.sample_tile()?.1)
    }

    fn sample_tile(&self) -> Result<(ElevationTile, f64)> {
        let tile = ElevationTile::open(self.tile_path())?;
        let value = tile.sample(self.point)?;
        Ok((tile, value))
    }
}

/// Elevation lookups against a directory of `nh_*.tif` tiles.
#[derive(Debug, Clone)]
pub struct ElevationService {
    /// Directory containing the tiles.
    tile_dir: PathBuf,
    /// Samples below this are treated as missing.
    nodata_threshold: f64,
}

impl ElevationService {
    /// Create a service with the default nodata threshold.
    pub fn new<P: AsRef<Path>>(tile_dir: P) -> Self {
        Self {
            tile_dir: tile_dir.as_ref().to_path_buf(),
            nodata_threshold: DEFAULT_NODATA_THRESHOLD,
        }
    }

    /// Create a builder for more configuration options.
    pub fn builder<P: AsRef<Path>>(tile_dir: P) -> ElevationServiceBuilder {
        ElevationServiceBuilder::new(tile_dir)
    }

    /// Raw value at `point`, see [`ElevationQuery::elevation`].
    pub fn elevation_at(&self, point: ProjectedPoint) -> Result<f64> {
        ElevationQuery::new(point, &self.tile_dir).elevation()
    }

    /// Whether `value` is a real measurement under this service's threshold.
    pub fn is_valid(&self, value: f64) -> bool {
        !value.is_nan() && value >= self.nodata_threshold
    }

    /// Get the tile directory path.
    pub fn tile_dir(&self) -> &Path {
        &self.tile_dir
    }

    /// Get the nodata threshold.
    pub fn nodata_threshold(&self) -> f64 {
        self.nodata_threshold
    }

    /// Scan the tile directory for tile files.
    ///
    /// Returns a sorted list of tile filenames (e.g., `["nh_75_6.tif"]`).
    /// Files that do not follow the naming convention are ignored.
    pub fn scan_tile_files(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.tile_dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut result: Vec<String> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| filename_to_tile_index(name).is_some())
            .collect();
        result.sort_by_key(|name| filename_to_tile_index(name));
        result
    }
}

impl RasterSource for ElevationService {
    fn sample(&self, point: ProjectedPoint) -> Result<Option<f64>> {
        let (tile, value) = ElevationQuery::new(point, &self.tile_dir).sample_tile()?;
        if tile.is_nodata(value) || !self.is_valid(value) {
            trace!(north = point.north, east = point.east, value, "nodata sample");
            return Ok(None);
        }
        Ok(Some(value))
    }
}

/// Builder for creating [`ElevationService`] with custom configuration.
///
/// # Example
///
/// ```ignore
/// use roadbook::ElevationServiceBuilder;
///
/// let service = ElevationServiceBuilder::new("/data/nh_all")
///     .nodata_threshold(-50.0)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ElevationServiceBuilder {
    tile_dir: PathBuf,
    nodata_threshold: f64,
}

impl ElevationServiceBuilder {
    /// Create a new builder with the specified tile directory.
    pub fn new<P: AsRef<Path>>(tile_dir: P) -> Self {
        Self {
            tile_dir: tile_dir.as_ref().to_path_buf(),
            nodata_threshold: DEFAULT_NODATA_THRESHOLD,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `ROADBOOK_TILE_DIR` | Directory containing `nh_*.tif` tiles | Required |
    /// | `ROADBOOK_NODATA_THRESHOLD` | Samples below this are missing | -100 |
    ///
    /// # Errors
    ///
    /// Returns an error if `ROADBOOK_TILE_DIR` is not set.
    pub fn from_env() -> Result<Self> {
        let tile_dir = std::env::var(TILE_DIR_ENV).map_err(|_| {
            RoadbookError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{TILE_DIR_ENV} environment variable not set"),
            ))
        })?;

        let nodata_threshold = std::env::var(NODATA_THRESHOLD_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_NODATA_THRESHOLD);

        Ok(Self {
            tile_dir: PathBuf::from(tile_dir),
            nodata_threshold,
        })
    }

    /// Set the tile directory.
    pub fn tile_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.tile_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the value below which samples count as missing.
    pub fn nodata_threshold(mut self, threshold: f64) -> Self {
        self.nodata_threshold = threshold;
        self
    }

    /// Build the [`ElevationService`].
    pub fn build(self) -> ElevationService {
        ElevationService {
            tile_dir: self.tile_dir,
            nodata_threshold: self.nodata_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::tests::write_geotiff;
    use tempfile::TempDir;

    /// 100 × 100 tile of 1 km pixels covering `nh_75_6`, value 400 everywhere
    /// except a sea pixel, a nodata pixel, and the Abisko turiststation pixel.
    fn create_abisko_tile(dir: &Path) {
        let mut data = vec![400.0f32; 100 * 100];
        // Abisko turiststation: row 12, col 55
        data[12 * 100 + 55] = 379.3;
        // row 0, col 0
        data[0] = -9999.0;
        // row 0, col 1
        data[1] = -200.0;
        write_geotiff(
            &dir.join("nh_75_6.tif"),
            7_600_000.0,
            600_000.0,
            1000.0,
            100,
            100,
            &data,
            Some("-9999"),
        );
    }

    #[test]
    fn test_query_tile_path() {
        let dir = Path::new("/data/nh_all");
        let query = ElevationQuery::new(ProjectedPoint::new(7_587_572.0, 655_498.0), dir);
        assert_eq!(query.tile_index(), (75, 6));
        assert_eq!(query.tile_path(), PathBuf::from("/data/nh_all/nh_75_6.tif"));
    }

    #[test]
    fn test_elevation_at_abisko() {
        let dir = TempDir::new().unwrap();
        create_abisko_tile(dir.path());
        let service = ElevationService::new(dir.path());

        let elevation = service
            .elevation_at(ProjectedPoint::new(7_587_572.0, 655_498.0))
            .unwrap();
        assert_eq!(elevation.round(), 379.0);
    }

    #[test]
    fn test_sample_filters_nodata() {
        let dir = TempDir::new().unwrap();
        create_abisko_tile(dir.path());
        let service = ElevationService::new(dir.path());

        // GdalNodata pixel
        let point = ProjectedPoint::new(7_599_500.0, 600_500.0);
        assert_eq!(service.elevation_at(point).unwrap(), -9999.0);
        assert_eq!(service.sample(point).unwrap(), None);

        // Below the threshold
        let point = ProjectedPoint::new(7_599_500.0, 601_500.0);
        assert_eq!(service.sample(point).unwrap(), None);

        let point = ProjectedPoint::new(7_550_000.0, 650_000.0);
        assert_eq!(service.sample(point).unwrap(), Some(400.0));
    }

    #[test]
    fn test_custom_threshold() {
        let dir = TempDir::new().unwrap();
        create_abisko_tile(dir.path());
        let service = ElevationService::builder(dir.path())
            .nodata_threshold(-500.0)
            .build();

        let point = ProjectedPoint::new(7_599_500.0, 601_500.0);
        assert_eq!(service.sample(point).unwrap(), Some(-200.0));
    }

    #[test]
    fn test_missing_tile() {
        let dir = TempDir::new().unwrap();
        let service = ElevationService::new(dir.path());

        let result = service.sample(ProjectedPoint::new(7_587_572.0, 655_498.0));
        match result {
            Err(RoadbookError::TileNotFound { path }) => {
                assert!(path.ends_with("nh_75_6.tif"));
            }
            other => panic!("Expected TileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_point_outside_raster() {
        let dir = TempDir::new().unwrap();
        // A tile that only covers the north-west 10 km of nh_75_6.
        write_geotiff(
            &dir.path().join("nh_75_6.tif"),
            7_600_000.0,
            600_000.0,
            1000.0,
            10,
            10,
            &[500.0; 100],
            None,
        );
        let service = ElevationService::new(dir.path());

        let result = service.sample(ProjectedPoint::new(7_587_572.0, 655_498.0));
        assert!(matches!(result, Err(RoadbookError::RasterSample { .. })));
    }

    #[test]
    fn test_scan_tile_files() {
        let dir = TempDir::new().unwrap();
        for name in ["nh_75_6.tif", "nh_66_4.tif", "nh_75_10.tif", "README.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let service = ElevationService::new(dir.path());

        assert_eq!(
            service.scan_tile_files(),
            vec!["nh_66_4.tif", "nh_75_6.tif", "nh_75_10.tif"]
        );
    }

    #[test]
    fn test_scan_missing_dir() {
        let service = ElevationService::new("/nonexistent/roadbook/tiles");
        assert!(service.scan_tile_files().is_empty());
    }
}
