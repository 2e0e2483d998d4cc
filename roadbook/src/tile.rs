//! GeoTIFF elevation tile parsing and sampling.
//!
//! This module provides the [`ElevationTile`] struct for reading a single
//! `nh_*.tif` file and sampling its first band at projected coordinates.
//!
//! Georeferencing is read from the GeoTIFF `ModelTiepointTag` and
//! `ModelPixelScaleTag`. The raster is assumed to be in SWEREF 99 TM, the
//! same CRS as [`ProjectedPoint`]; no reprojection happens here. Tiles
//! declaring `RasterPixelIsPoint` have their tie point moved half a pixel so
//! that every pixel is treated as an area.
//!
//! Only the strip or tile holding the requested pixel is decoded.

use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::coordinates::ProjectedPoint;
use crate::error::{Result, RoadbookError};

/// `GTRasterTypeGeoKey` in the GeoKey directory.
const RASTER_TYPE_GEO_KEY: u16 = 1025;
/// `RasterPixelIsPoint` value of [`RASTER_TYPE_GEO_KEY`].
const RASTER_PIXEL_IS_POINT: u16 = 2;

/// Placement of the raster grid in projected space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// Easting of the west edge of column 0.
    pub origin_east: f64,
    /// Northing of the north edge of row 0.
    pub origin_north: f64,
    /// Pixel width in metres.
    pub pixel_width: f64,
    /// Pixel height in metres.
    pub pixel_height: f64,
}

/// A memory-mapped elevation tile.
///
/// Opening reads the header only. Each [`ElevationTile::sample`] decodes the
/// single strip or tile containing the pixel.
///
/// # Example
///
/// ```ignore
/// use roadbook::{ElevationTile, ProjectedPoint};
///
/// let tile = ElevationTile::open("/data/nh_all/nh_75_6.tif")?;
/// let elevation = tile.sample(ProjectedPoint::new(7_587_572.0, 655_498.0))?;
/// println!("Elevation: {elevation:.1}m");
/// ```
pub struct ElevationTile {
    path: PathBuf,
    data: Mmap,
    width: usize,
    height: usize,
    transform: GeoTransform,
    /// Value of the `GdalNodata` tag, if present.
    nodata: Option<f64>,
}

impl ElevationTile {
    /// Map a tile and read its header.
    ///
    /// # Errors
    ///
    /// Returns [`RoadbookError::TileNotFound`] if the file does not exist and
    /// [`RoadbookError::RasterDecode`] if it is not a georeferenced TIFF.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RoadbookError::TileNotFound { path });
            }
            Err(e) => return Err(e.into()),
        };

        // SAFETY: Memory mapping is safe as long as the file is not modified
        // while mapped. The mapping is read-only.
        let data = unsafe { Mmap::map(&file)? };

        let decode_err = |e: tiff::TiffError| RoadbookError::RasterDecode {
            path: path.clone(),
            reason: e.to_string(),
        };

        let mut decoder = Decoder::new(Cursor::new(&data[..])).map_err(decode_err)?;
        let (width, height) = decoder.dimensions().map_err(decode_err)?;
        if width == 0 || height == 0 {
            return Err(RoadbookError::RasterDecode {
                path,
                reason: "empty raster".to_string(),
            });
        }

        let scale = decoder
            .get_tag_f64_vec(Tag::ModelPixelScaleTag)
            .map_err(decode_err)?;
        let tiepoint = decoder
            .get_tag_f64_vec(Tag::ModelTiepointTag)
            .map_err(decode_err)?;
        let mut transform = geo_transform(&scale, &tiepoint).ok_or_else(|| {
            RoadbookError::RasterDecode {
                path: path.clone(),
                reason: "missing or invalid GeoTIFF georeferencing".to_string(),
            }
        })?;

        let geo_keys = decoder
            .find_tag_unsigned_vec::<u16>(Tag::GeoKeyDirectoryTag)
            .map_err(decode_err)?;
        if geo_keys.as_deref().is_some_and(is_pixel_is_point) {
            transform.origin_east -= transform.pixel_width / 2.0;
            transform.origin_north += transform.pixel_height / 2.0;
        }

        let nodata = match decoder.find_tag(Tag::GdalNodata).map_err(decode_err)? {
            Some(value) => value
                .into_string()
                .ok()
                .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok()),
            None => None,
        };

        Ok(Self {
            path,
            data,
            width: width as usize,
            height: height as usize,
            transform,
            nodata,
        })
    }

    /// Sample the first band at `point`.
    ///
    /// Returns the value of the pixel containing the point, including any
    /// nodata sentinel; see [`ElevationTile::is_nodata`].
    ///
    /// # Errors
    ///
    /// Returns [`RoadbookError::RasterSample`] if the point is outside the
    /// raster coverage and [`RoadbookError::RasterDecode`] if the chunk
    /// holding it cannot be decoded.
    pub fn sample(&self, point: ProjectedPoint) -> Result<f64> {
        let (row, col) = self.pixel(point).ok_or_else(|| RoadbookError::RasterSample {
            north: point.north,
            east: point.east,
            path: self.path.clone(),
        })?;
        self.read_pixel(row, col)
    }

    /// `(row, col)` of the pixel containing `point`, if inside the raster.
    fn pixel(&self, point: ProjectedPoint) -> Option<(usize, usize)> {
        let GeoTransform {
            origin_east,
            origin_north,
            pixel_width,
            pixel_height,
        } = self.transform;

        let col = ((point.east - origin_east) / pixel_width).floor();
        let row = ((origin_north - point.north) / pixel_height).floor();

        if !(0.0..self.width as f64).contains(&col) || !(0.0..self.height as f64).contains(&row) {
            return None;
        }
        Some((row as usize, col as usize))
    }

    /// Decode the chunk holding `(row, col)` and read band 1 from it.
    fn read_pixel(&self, row: usize, col: usize) -> Result<f64> {
        let decode_err = |e: tiff::TiffError| RoadbookError::RasterDecode {
            path: self.path.clone(),
            reason: e.to_string(),
        };

        let mut decoder = Decoder::new(Cursor::new(&self.data[..])).map_err(decode_err)?;
        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        let (chunk_width, chunk_height) = (chunk_width as usize, chunk_height as usize);
        if chunk_width == 0 || chunk_height == 0 {
            return Err(RoadbookError::RasterDecode {
                path: self.path.clone(),
                reason: "zero-sized chunks".to_string(),
            });
        }

        // Strips span the full width, so this also covers stripped files.
        let chunks_across = self.width.div_ceil(chunk_width);
        let index = (row / chunk_height) * chunks_across + col / chunk_width;
        let index = u32::try_from(index).map_err(|e| decode_err(e.into()))?;

        let (data_width, data_height) = decoder.chunk_data_dimensions(index);
        let chunk = decoder.read_chunk(index).map_err(decode_err)?;
        let samples = to_f64(chunk).ok_or_else(|| RoadbookError::RasterDecode {
            path: self.path.clone(),
            reason: "unsupported sample format".to_string(),
        })?;

        // Pixel-interleaved bands: band 1 is the first sample of each pixel.
        let pixels = data_width as usize * data_height as usize;
        let bands = samples.len() / pixels.max(1);
        let offset = ((row % chunk_height) * data_width as usize + col % chunk_width) * bands;

        samples
            .get(offset)
            .copied()
            .ok_or_else(|| RoadbookError::RasterDecode {
                path: self.path.clone(),
                reason: format!("chunk {index} holds {} samples", samples.len()),
            })
    }

    /// Whether `value` is the tile's own nodata marker.
    pub fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata == Some(value)
    }

    /// Returns the raster width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the raster height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the grid placement.
    pub fn transform(&self) -> GeoTransform {
        self.transform
    }

    /// Returns the `GdalNodata` value, if the file declares one.
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Returns the file this tile was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Build the grid placement from `ModelPixelScaleTag` (`[sx, sy, sz]`) and
/// the first `ModelTiepointTag` (`[i, j, k, x, y, z]`).
fn geo_transform(scale: &[f64], tiepoint: &[f64]) -> Option<GeoTransform> {
    let (&pixel_width, &pixel_height) = (scale.first()?, scale.get(1)?);
    if !(pixel_width > 0.0 && pixel_height > 0.0) {
        return None;
    }
    let [i, j, _k, x, y, _z] = <[f64; 6]>::try_from(tiepoint.get(..6)?).ok()?;

    Some(GeoTransform {
        origin_east: x - i * pixel_width,
        origin_north: y + j * pixel_height,
        pixel_width,
        pixel_height,
    })
}

/// Whether a `GeoKeyDirectoryTag` declares `RasterPixelIsPoint`.
///
/// The directory is a 4-value header followed by
/// `[key, location, count, value]` entries; location 0 means the value is
/// stored inline.
fn is_pixel_is_point(keys: &[u16]) -> bool {
    keys.get(4..)
        .unwrap_or_default()
        .chunks_exact(4)
        .any(|entry| {
            entry[0] == RASTER_TYPE_GEO_KEY && entry[1] == 0 && entry[3] == RASTER_PIXEL_IS_POINT
        })
}

fn to_f64(image: DecodingResult) -> Option<Vec<f64>> {
    let samples = match image {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(samples)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};
    use tiff::encoder::{colortype, TiffEncoder};

    /// Write a single-band float GeoTIFF whose north-west corner is at
    /// `(origin_north, origin_east)`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn write_geotiff(
        path: &Path,
        origin_north: f64,
        origin_east: f64,
        pixel_size: f64,
        width: u32,
        height: u32,
        data: &[f32],
        nodata: Option<&str>,
    ) {
        let file = File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        let mut image = encoder
            .new_image::<colortype::Gray32Float>(width, height)
            .unwrap();
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &[pixel_size, pixel_size, 0.0][..])
            .unwrap();
        image
            .encoder()
            .write_tag(
                Tag::ModelTiepointTag,
                &[0.0, 0.0, 0.0, origin_east, origin_north, 0.0][..],
            )
            .unwrap();
        if let Some(nodata) = nodata {
            image.encoder().write_tag(Tag::GdalNodata, nodata).unwrap();
        }
        image.write_data(data).unwrap();
    }

    /// 4 × 3 tile of 10 m pixels with value `100 * row + col`.
    fn create_small_tile(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("nh_75_6.tif");
        let data: Vec<f32> = (0..3)
            .flat_map(|row| (0..4).map(move |col| (100 * row + col) as f32))
            .collect();
        write_geotiff(&path, 7_500_030.0, 600_000.0, 10.0, 4, 3, &data, Some("-9999"));
        path
    }

    #[test]
    fn test_open_tile() {
        let dir = TempDir::new().unwrap();
        let tile = ElevationTile::open(create_small_tile(&dir)).unwrap();

        assert_eq!(tile.width(), 4);
        assert_eq!(tile.height(), 3);
        assert_eq!(tile.nodata(), Some(-9999.0));
        assert_eq!(
            tile.transform(),
            GeoTransform {
                origin_east: 600_000.0,
                origin_north: 7_500_030.0,
                pixel_width: 10.0,
                pixel_height: 10.0,
            }
        );
    }

    #[test]
    fn test_sample_pixels() {
        let dir = TempDir::new().unwrap();
        let tile = ElevationTile::open(create_small_tile(&dir)).unwrap();

        // North-west pixel
        assert_eq!(tile.sample(ProjectedPoint::new(7_500_029.0, 600_001.0)).unwrap(), 0.0);
        // Row 1, col 2
        assert_eq!(tile.sample(ProjectedPoint::new(7_500_015.0, 600_025.0)).unwrap(), 102.0);
        // South-east pixel
        assert_eq!(tile.sample(ProjectedPoint::new(7_500_000.5, 600_039.5)).unwrap(), 203.0);
    }

    #[test]
    fn test_sample_outside_coverage() {
        let dir = TempDir::new().unwrap();
        let tile = ElevationTile::open(create_small_tile(&dir)).unwrap();

        for point in [
            ProjectedPoint::new(7_500_031.0, 600_010.0),
            ProjectedPoint::new(7_499_999.0, 600_010.0),
            ProjectedPoint::new(7_500_010.0, 599_999.0),
            ProjectedPoint::new(7_500_010.0, 600_040.0),
        ] {
            assert!(matches!(
                tile.sample(point),
                Err(RoadbookError::RasterSample { .. })
            ));
        }
    }

    #[test]
    fn test_nodata() {
        let dir = TempDir::new().unwrap();
        let tile = ElevationTile::open(create_small_tile(&dir)).unwrap();

        assert!(tile.is_nodata(-9999.0));
        assert!(tile.is_nodata(f64::NAN));
        assert!(!tile.is_nodata(0.0));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = ElevationTile::open(dir.path().join("nh_1_1.tif"));
        assert!(matches!(result, Err(RoadbookError::TileNotFound { .. })));
    }

    #[test]
    fn test_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 1000]).unwrap();

        let result = ElevationTile::open(file.path());
        assert!(matches!(result, Err(RoadbookError::RasterDecode { .. })));
    }

    #[test]
    fn test_missing_georeferencing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.tif");
        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder
            .write_image::<colortype::Gray32Float>(2, 2, &[1.0, 2.0, 3.0, 4.0])
            .unwrap();

        let result = ElevationTile::open(&path);
        assert!(matches!(result, Err(RoadbookError::RasterDecode { .. })));
    }

    #[test]
    fn test_sample_across_strips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nh_75_6.tif");
        let (width, height) = (5u32, 7u32);
        let data: Vec<f32> = (0..height)
            .flat_map(|row| (0..width).map(move |col| (100 * row + col) as f32))
            .collect();

        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        let mut image = encoder
            .new_image::<colortype::Gray32Float>(width, height)
            .unwrap();
        // Four strips, the last one a single row.
        image.rows_per_strip(2).unwrap();
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &[10.0, 10.0, 0.0][..])
            .unwrap();
        image
            .encoder()
            .write_tag(
                Tag::ModelTiepointTag,
                &[0.0, 0.0, 0.0, 600_000.0, 7_500_070.0, 0.0][..],
            )
            .unwrap();
        image.write_data(&data).unwrap();

        let tile = ElevationTile::open(&path).unwrap();
        for row in 0..height {
            for col in 0..width {
                let point = ProjectedPoint::new(
                    7_500_070.0 - 10.0 * row as f64 - 5.0,
                    600_000.0 + 10.0 * col as f64 + 5.0,
                );
                assert_eq!(tile.sample(point).unwrap(), (100 * row + col) as f64);
            }
        }
    }

    #[test]
    fn test_pixel_is_point() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nh_75_6.tif");
        let data: Vec<f32> = (0..4).map(|v| v as f32).collect();

        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        let mut image = encoder
            .new_image::<colortype::Gray32Float>(2, 2)
            .unwrap();
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &[10.0, 10.0, 0.0][..])
            .unwrap();
        // Tie point at the centre of the north-west pixel.
        image
            .encoder()
            .write_tag(
                Tag::ModelTiepointTag,
                &[0.0, 0.0, 0.0, 600_005.0, 7_500_015.0, 0.0][..],
            )
            .unwrap();
        image
            .encoder()
            .write_tag(
                Tag::GeoKeyDirectoryTag,
                &[1u16, 1, 0, 1, RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_POINT][..],
            )
            .unwrap();
        image.write_data(&data).unwrap();

        let tile = ElevationTile::open(&path).unwrap();
        assert_eq!(tile.transform().origin_east, 600_000.0);
        assert_eq!(tile.transform().origin_north, 7_500_020.0);
        assert_eq!(tile.sample(ProjectedPoint::new(7_500_019.0, 600_001.0)).unwrap(), 0.0);
        assert_eq!(tile.sample(ProjectedPoint::new(7_500_001.0, 600_019.0)).unwrap(), 3.0);
    }

    #[test]
    fn test_raster_type_key() {
        // PixelIsArea
        assert!(!is_pixel_is_point(&[1, 1, 0, 1, 1025, 0, 1, 1]));
        assert!(is_pixel_is_point(&[1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 2]));
        assert!(!is_pixel_is_point(&[1, 1, 0]));
    }

    #[test]
    fn test_geo_transform() {
        let transform =
            geo_transform(&[2.0, 2.0, 0.0], &[1.0, 1.0, 0.0, 100.0, 200.0, 0.0]).unwrap();
        assert_eq!(transform.origin_east, 98.0);
        assert_eq!(transform.origin_north, 202.0);

        assert!(geo_transform(&[2.0], &[0.0; 6]).is_none());
        assert!(geo_transform(&[2.0, 2.0, 0.0], &[0.0; 3]).is_none());
        assert!(geo_transform(&[0.0, 2.0, 0.0], &[0.0; 6]).is_none());
    }
}
