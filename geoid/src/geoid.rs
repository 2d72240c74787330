//! The windowed geoid store.
//!
//! [`Geoid`] keeps its file open and reads samples on demand. Two caches sit
//! in front of the file: an optional rectangular [area cache](Geoid::cache_area)
//! and a single-cell cache holding the neighborhood of the last cell queried.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::area::{AreaCache, BoundingBox};
use crate::error::{GeoidError, Result};
use crate::filename::{default_geoid_path, find_model};
use crate::grid::{CellPosition, Grid};
use crate::interpolate::{self, Interpolation, Undulation};
use crate::model::{open_file, GeoidInfo, GeoidModel};
use crate::pixel::PixelFile;
use crate::resident::ThreadSafeGeoid;
use crate::stencil::{CellCache, Neighborhood};

/// A geoid model read lazily from its file.
///
/// Queries take `&mut self` since they update the caches; share a `Geoid`
/// between threads only behind a lock, or use [`ThreadSafeGeoid`].
///
/// # Example
///
/// ```ignore
/// use geoid::{Geoid, GeoidModel, Interpolation};
///
/// let mut geoid = Geoid::open("/usr/local/share/GeographicLib/geoids/egm96-5.pgm",
///     Interpolation::Cubic)?;
/// let n = geoid.height(42.0, -75.0)?;
/// println!("Geoid height: {:.3}m", n);
/// ```
pub struct Geoid {
    info: GeoidInfo,
    grid: Grid,
    pixels: PixelFile,
    area: Option<AreaCache>,
    cell: Option<CellCache>,
}

impl Geoid {
    /// Open the geoid file at `path`.
    ///
    /// # Errors
    ///
    /// - [`GeoidError::FileNotFound`] if the file does not exist
    /// - [`GeoidError::InvalidHeader`] if the header is malformed or the file
    ///   length does not match it
    /// - [`GeoidError::Io`] for any other failure opening the file
    pub fn open<P: AsRef<Path>>(path: P, interpolation: Interpolation) -> Result<Self> {
        let path = path.as_ref();
        let (file, info) = open_file(path, interpolation)?;
        let pixels = PixelFile::new(path, file, &info.header);
        Ok(Self {
            grid: info.grid(),
            info,
            pixels,
            area: None,
            cell: None,
        })
    }

    /// Create a builder that locates model `name` in a geoid directory.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use geoid::{Geoid, Interpolation};
    ///
    /// let geoid = Geoid::builder("egm2008-1")
    ///     .directory("/data/geoids")
    ///     .interpolation(Interpolation::Bilinear)
    ///     .build()?;
    /// ```
    pub fn builder(name: impl Into<String>) -> GeoidBuilder {
        GeoidBuilder::new(name)
    }

    fn locate(&self, lat: f64, lon: f64) -> Result<CellPosition> {
        self.grid.cell(lat, lon)
    }

    /// Neighborhood of the cell at `cell`, from the cell cache if possible.
    fn neighborhood(&mut self, cell: &CellPosition) -> Result<Neighborhood> {
        if let Some(nb) = self.cell.as_ref().and_then(|c| c.lookup(cell.ix, cell.iy)) {
            return Ok(nb);
        }
        let grid = self.grid;
        let (area, pixels) = (self.area.as_ref(), &mut self.pixels);
        let nb = Neighborhood::fetch(&grid, self.info.interpolation, cell.ix, cell.iy, |x, y| {
            raw_value(&grid, area, pixels, x, y)
        })?;
        self.cell = Some(CellCache {
            ix: cell.ix,
            iy: cell.iy,
            neighborhood: nb,
        });
        Ok(nb)
    }
}

/// Sample at a possibly out-of-range pixel address, served from the area
/// cache when it holds the pixel.
fn raw_value(
    grid: &Grid,
    area: Option<&AreaCache>,
    pixels: &mut PixelFile,
    ix: i64,
    iy: i64,
) -> Result<u32> {
    let (ix, iy) = grid.wrap(ix, iy);
    match area.and_then(|a| a.get(ix, iy, grid.width())) {
        Some(value) => Ok(value),
        None => pixels.read(ix, iy),
    }
}

impl GeoidModel for Geoid {
    fn info(&self) -> &GeoidInfo {
        &self.info
    }

    fn height(&mut self, lat: f64, lon: f64) -> Result<f64> {
        let cell = self.locate(lat, lon)?;
        let nb = self.neighborhood(&cell)?;
        let header = &self.info.header;
        Ok(interpolate::height(&nb, &cell, header.offset, header.scale))
    }

    fn undulation(&mut self, lat: f64, lon: f64) -> Result<Undulation> {
        let cell = self.locate(lat, lon)?;
        let nb = self.neighborhood(&cell)?;
        let header = &self.info.header;
        Ok(interpolate::undulation(
            &nb,
            &cell,
            &self.grid,
            lat,
            header.offset,
            header.scale,
        ))
    }

    /// Replace the area cache with one covering the given rectangle.
    ///
    /// `south > north` clears the cache. On failure the previous cache, if
    /// any, is kept.
    fn cache_area(&mut self, south: f64, west: f64, north: f64, east: f64) -> Result<()> {
        if [south, west, north, east].iter().any(|v| !v.is_finite()) {
            return Err(GeoidError::InvalidCoordinate {
                message: format!("cache bounds must be finite: {south}, {west}, {north}, {east}"),
            });
        }
        if south > north {
            return self.clear_cache();
        }
        let bounds = BoundingBox::new(south, west, north, east);
        let area = AreaCache::load(&self.grid, self.info.interpolation, bounds, &mut self.pixels)?;
        self.area = Some(area);
        Ok(())
    }

    fn clear_cache(&mut self) -> Result<()> {
        if self.area.take().is_some() {
            debug!(path = %self.info.path.display(), "Area cache cleared");
        }
        Ok(())
    }

    fn cache_extent(&self) -> Option<BoundingBox> {
        self.area.as_ref().map(AreaCache::extent)
    }

    fn is_thread_safe(&self) -> bool {
        false
    }
}

/// Builder for locating and opening a geoid model by name.
#[derive(Debug, Clone)]
pub struct GeoidBuilder {
    name: String,
    directory: Option<PathBuf>,
    interpolation: Interpolation,
}

impl GeoidBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directory: None,
            interpolation: Interpolation::default(),
        }
    }

    /// Directory to search. Defaults to
    /// [`default_geoid_path`](crate::filename::default_geoid_path).
    pub fn directory<P: AsRef<Path>>(mut self, directory: P) -> Self {
        self.directory = Some(directory.as_ref().to_path_buf());
        self
    }

    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    fn path(&self) -> Result<PathBuf> {
        let directory = self.directory.clone().unwrap_or_else(default_geoid_path);
        find_model(&directory, &self.name)
    }

    /// Open a windowed [`Geoid`].
    pub fn build(self) -> Result<Geoid> {
        Geoid::open(self.path()?, self.interpolation)
    }

    /// Load the whole model into a [`ThreadSafeGeoid`].
    pub fn build_thread_safe(self) -> Result<ThreadSafeGeoid> {
        ThreadSafeGeoid::open(self.path()?, self.interpolation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConvertDirection;
    use crate::test_support::{write_geoid, write_smooth_geoid, write_toy_geoid};
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    fn toy(interpolation: Interpolation) -> (TempDir, Geoid) {
        let dir = TempDir::new().unwrap();
        let path = write_toy_geoid(dir.path());
        let geoid = Geoid::open(path, interpolation).unwrap();
        (dir, geoid)
    }

    fn assert_toy_lattice(geoid: &mut Geoid, state: &str) {
        // Row 1 is the equator, column 1 is 90°E
        assert_eq!(geoid.height(0.0, 90.0).unwrap(), 11.0, "{state}");
        assert_eq!(geoid.height(90.0, 180.0).unwrap(), 2.0, "{state}");
        assert_eq!(geoid.height(-90.0, 270.0).unwrap(), 23.0, "{state}");
        // Same meridian as 270°
        assert_eq!(geoid.height(0.0, -90.0).unwrap(), 13.0, "{state}");
    }

    #[test]
    fn test_lattice_point_returns_stored_sample() {
        let (_dir, mut geoid) = toy(Interpolation::Bilinear);
        assert_toy_lattice(&mut geoid, "uncached");

        geoid.cache_all().unwrap();
        assert_toy_lattice(&mut geoid, "whole grid cached");

        // Holds (0, 90) only; the other nodes fall through to the file
        geoid.cache_area(-10.0, 80.0, 10.0, 100.0).unwrap();
        assert!(!geoid.cache_extent().unwrap().contains(90.0, 180.0));
        assert_toy_lattice(&mut geoid, "partial window");

        geoid.clear_cache().unwrap();
        assert_toy_lattice(&mut geoid, "cleared");
    }

    #[test]
    fn test_caching_same_window_twice() {
        let dir = TempDir::new().unwrap();
        let path = write_smooth_geoid(dir.path());
        let windows = [
            BoundingBox::new(-30.0, 170.0, 40.0, -150.0),
            BoundingBox::new(80.0, -20.0, 90.0, 20.0),
            BoundingBox::new(-90.0, 175.0, -85.0, 185.0),
        ];
        let points = [
            (0.0, 175.0),
            (39.9, 180.0),
            (-29.9, -151.0),
            (90.0, 0.0),
            (87.5, 12.0),
            (-90.0, 180.0),
            (-88.0, -178.0),
        ];
        for interpolation in [Interpolation::Bilinear, Interpolation::Cubic] {
            for w in windows {
                let mut once = Geoid::open(&path, interpolation).unwrap();
                let mut twice = Geoid::open(&path, interpolation).unwrap();
                once.cache_area(w.south, w.west, w.north, w.east).unwrap();
                twice.cache_area(w.south, w.west, w.north, w.east).unwrap();
                twice.cache_area(w.south, w.west, w.north, w.east).unwrap();

                assert_eq!(once.cache_extent(), twice.cache_extent());
                for (lat, lon) in points {
                    assert_eq!(
                        once.undulation(lat, lon).unwrap(),
                        twice.undulation(lat, lon).unwrap(),
                        "{interpolation} {w:?} at ({lat}, {lon})"
                    );
                }
            }
        }
    }

    #[test]
    fn test_cell_center_is_corner_average() {
        let (_dir, mut geoid) = toy(Interpolation::Bilinear);
        assert_eq!(geoid.height(45.0, 45.0).unwrap(), 5.5);
        // Repeat hits the cell cache
        assert_eq!(geoid.height(45.0, 45.0).unwrap(), 5.5);
    }

    #[test]
    fn test_out_of_bounds() {
        let (_dir, mut geoid) = toy(Interpolation::Cubic);
        assert!(matches!(geoid.height(90.5, 0.0), Err(GeoidError::OutOfBounds { .. })));
        assert!(matches!(geoid.undulation(f64::NAN, 0.0), Err(GeoidError::OutOfBounds { .. })));
        assert!(matches!(
            geoid.height(0.0, f64::INFINITY),
            Err(GeoidError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_cubic_reproduces_linear_field() {
        // Away from the polar cells a field linear in latitude is reproduced
        let dir = TempDir::new().unwrap();
        let path = write_geoid(dir.path(), "rows", 8, 5, 0.0, 1.0, |_, row| {
            (100 + 10 * row) as u16
        });
        let mut geoid = Geoid::open(path, Interpolation::Cubic).unwrap();
        for (lat, expected) in [(45.0, 110.0), (22.5, 115.0), (-10.0, 122.2222), (-44.0, 129.7778)] {
            let h = geoid.height(lat, 17.0).unwrap();
            assert!((h - expected).abs() < 1e-3, "lat {lat}: {h}");
        }
    }

    #[test]
    fn test_cache_is_transparent() {
        let dir = TempDir::new().unwrap();
        let path = write_smooth_geoid(dir.path());
        for interpolation in [Interpolation::Bilinear, Interpolation::Cubic] {
            let mut uncached = Geoid::open(&path, interpolation).unwrap();
            let mut cached = Geoid::open(&path, interpolation).unwrap();
            cached.cache_area(-30.0, 170.0, 40.0, -150.0).unwrap();
            assert!(cached.is_cached());

            for (lat, lon) in [(0.0, 175.0), (-29.9, -151.0), (39.9, 180.0), (12.3, 190.7)] {
                assert_eq!(
                    cached.undulation(lat, lon).unwrap(),
                    uncached.undulation(lat, lon).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_cache_then_clear_matches_uncached() {
        let dir = TempDir::new().unwrap();
        let path = write_smooth_geoid(dir.path());
        let mut geoid = Geoid::open(&path, Interpolation::Cubic).unwrap();
        let before = geoid.height(51.5, -0.1).unwrap();

        geoid.cache_area(50.0, -2.0, 53.0, 2.0).unwrap();
        let extent = geoid.cache_extent().unwrap();
        assert!(extent.contains(51.5, -0.1));
        geoid.clear_cache().unwrap();
        assert!(!geoid.is_cached());
        assert_eq!(geoid.cache_extent(), None);

        assert_eq!(geoid.height(51.5, -0.1).unwrap(), before);
    }

    #[test]
    fn test_cache_all_and_inverted_bounds() {
        let (_dir, mut geoid) = toy(Interpolation::Cubic);
        geoid.cache_all().unwrap();
        assert_eq!(geoid.cache_extent(), Some(BoundingBox::world()));
        geoid.cache_area(10.0, 0.0, -10.0, 20.0).unwrap();
        assert!(!geoid.is_cached());
        assert!(geoid.cache_area(f64::NAN, 0.0, 10.0, 20.0).is_err());
    }

    #[test]
    fn test_truncated_file_is_read_error() {
        let (dir, mut geoid) = toy(Interpolation::Bilinear);
        let data_start = geoid.info().header().data_start;
        OpenOptions::new()
            .write(true)
            .open(dir.path().join("toy.pgm"))
            .unwrap()
            .set_len(data_start)
            .unwrap();
        assert!(matches!(geoid.height(45.0, 45.0), Err(GeoidError::Read { .. })));
    }

    #[test]
    fn test_failed_cache_keeps_previous_window() {
        let dir = TempDir::new().unwrap();
        let path = write_smooth_geoid(dir.path());
        let mut geoid = Geoid::open(&path, Interpolation::Bilinear).unwrap();
        geoid.cache_area(0.0, 0.0, 10.0, 10.0).unwrap();
        let extent = geoid.cache_extent();
        let inside = geoid.height(5.0, 5.0).unwrap();

        // Drop the southern hemisphere from the file
        let data_start = geoid.info().header().data_start;
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(data_start + 2 * 72 * 19)
            .unwrap();

        let result = geoid.cache_area(-50.0, 0.0, -40.0, 10.0);
        assert!(matches!(result, Err(GeoidError::Read { .. })));
        assert_eq!(geoid.cache_extent(), extent);
        // Served from the retained window
        assert_eq!(geoid.height(5.0, 5.0).unwrap(), inside);
    }

    #[test]
    fn test_builder_finds_model() {
        let dir = TempDir::new().unwrap();
        write_toy_geoid(dir.path());
        let geoid = Geoid::builder("toy")
            .directory(dir.path())
            .interpolation(Interpolation::Bilinear)
            .build()
            .unwrap();
        assert_eq!(geoid.name(), "toy");
        assert_eq!(geoid.interpolation(), Interpolation::Bilinear);
        assert!(!geoid.is_thread_safe());
        assert_eq!(geoid.max_error(), Some(0.5));
        assert_eq!(geoid.rms_error(), Some(0.1));
        assert_eq!(geoid.grid_width(), 4);
        assert_eq!(geoid.grid_height(), 3);

        let resident = Geoid::builder("toy")
            .directory(dir.path())
            .build_thread_safe()
            .unwrap();
        assert!(resident.is_thread_safe());
        assert_eq!(resident.max_error(), Some(0.25));

        let missing = Geoid::builder("egm96-5").directory(dir.path()).build();
        assert!(matches!(missing, Err(GeoidError::FileNotFound { .. })));
    }

    #[test]
    fn test_convert_height() {
        let (_dir, mut geoid) = toy(Interpolation::Bilinear);
        let n = geoid.height(45.0, 45.0).unwrap();
        let h = geoid
            .convert_height(45.0, 45.0, 100.0, ConvertDirection::EllipsoidToGeoid)
            .unwrap();
        assert_eq!(h, 100.0 - n);
        let back = geoid
            .convert_height(45.0, 45.0, h, ConvertDirection::GeoidToEllipsoid)
            .unwrap();
        assert_eq!(back, 100.0);
        assert_eq!(
            geoid.convert_height(45.0, 45.0, 7.0, ConvertDirection::None).unwrap(),
            7.0
        );
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn smooth() -> (TempDir, PathBuf) {
            let dir = TempDir::new().unwrap();
            let path = write_smooth_geoid(dir.path());
            (dir, path)
        }

        fn interpolation() -> impl Strategy<Value = Interpolation> {
            prop_oneof![Just(Interpolation::Bilinear), Just(Interpolation::Cubic)]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn test_longitude_is_periodic(
                lat in -90.0..=90.0_f64,
                lon in -180.0..180.0_f64,
                interp in interpolation()
            ) {
                let (_dir, path) = smooth();
                let mut geoid = Geoid::open(&path, interp).unwrap();
                let a = geoid.height(lat, lon)?;
                for k in [-1.0, 1.0, 2.0] {
                    let b = geoid.height(lat, lon + k * 360.0)?;
                    prop_assert!((a - b).abs() < 1e-9, "{} vs {} at ({}, {}) k={}", a, b, lat, lon, k);
                }
            }

            #[test]
            fn test_integer_longitude_is_exactly_periodic(
                lat in -90.0..=90.0_f64,
                lon in -180i32..180,
                interp in interpolation()
            ) {
                let (_dir, path) = smooth();
                let mut geoid = Geoid::open(&path, interp).unwrap();
                let lon = lon as f64;
                let a = geoid.undulation(lat, lon)?;
                for k in [-1.0, 1.0, 2.0] {
                    prop_assert_eq!(geoid.undulation(lat, lon + k * 360.0)?, a);
                }
            }

            #[test]
            fn test_area_cache_never_changes_answers(
                south in -90.0..90.0_f64,
                lat_span in 0.0..60.0_f64,
                west in -180.0..180.0_f64,
                lon_span in 0.0..360.0_f64,
                lat in -90.0..=90.0_f64,
                lon in -180.0..180.0_f64,
                interp in interpolation()
            ) {
                let (_dir, path) = smooth();
                let mut uncached = Geoid::open(&path, interp).unwrap();
                let mut cached = Geoid::open(&path, interp).unwrap();
                let north = (south + lat_span).min(90.0);
                cached.cache_area(south, west, north, west + lon_span)?;
                prop_assert_eq!(cached.undulation(lat, lon)?, uncached.undulation(lat, lon)?);
            }

            #[test]
            fn test_repeated_queries_agree(
                lat in -90.0..=90.0_f64,
                lon in -180.0..180.0_f64,
                other_lat in -90.0..=90.0_f64,
                other_lon in -180.0..180.0_f64,
                interp in interpolation()
            ) {
                let (_dir, path) = smooth();
                let mut geoid = Geoid::open(&path, interp).unwrap();
                let first = geoid.height(lat, lon)?;
                geoid.height(other_lat, other_lon)?;
                prop_assert_eq!(geoid.height(lat, lon)?, first);
            }

            #[test]
            fn test_thread_safe_matches_windowed(
                lat in -90.0..=90.0_f64,
                lon in -540.0..540.0_f64,
                interp in interpolation()
            ) {
                let (_dir, path) = smooth();
                let mut windowed = Geoid::open(&path, interp).unwrap();
                let resident = ThreadSafeGeoid::open(&path, interp).unwrap();
                prop_assert_eq!(resident.undulation(lat, lon)?, windowed.undulation(lat, lon)?);
            }

            #[test]
            fn test_bilinear_pole_is_single_valued(
                lon in -180.0..180.0_f64,
                other_lon in -180.0..180.0_f64,
                eps in 0.0..1e-7_f64
            ) {
                // Every pole row of the smooth grid holds a single value
                let (_dir, path) = smooth();
                let mut geoid = Geoid::open(&path, Interpolation::Bilinear).unwrap();
                for pole in [90.0, -90.0] {
                    let at_pole = geoid.height(pole, other_lon)?;
                    let near = geoid.height(pole - eps * pole.signum(), lon)?;
                    prop_assert!((near - at_pole).abs() < 1e-6, "{} vs {} at {}", near, at_pole, pole);
                }
            }

            #[test]
            fn test_bilinear_stays_within_samples(
                lat in -90.0..=90.0_f64,
                lon in -180.0..180.0_f64
            ) {
                // Stored heights of the smooth grid lie in [-70, 70]
                let (_dir, path) = smooth();
                let mut geoid = Geoid::open(&path, Interpolation::Bilinear).unwrap();
                let h = geoid.height(lat, lon)?;
                prop_assert!((-70.0..=70.0).contains(&h), "{} at ({}, {})", h, lat, lon);
            }
        }
    }
}
