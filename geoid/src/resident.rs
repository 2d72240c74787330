//! The fully loaded, thread-safe geoid store.

use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use crate::area::BoundingBox;
use crate::error::{GeoidError, Result};
use crate::grid::Grid;
use crate::interpolate::{self, Interpolation, Undulation};
use crate::model::{open_file, ConvertDirection, GeoidInfo, GeoidModel};
use crate::stencil::Neighborhood;

/// A geoid model held entirely in memory.
///
/// The raster is decoded once at construction and the file is closed.
/// Queries take `&self`, so a `ThreadSafeGeoid` can be shared between
/// threads, typically in an [`Arc`](std::sync::Arc). There are no caches to
/// manage; [`cache_area`](GeoidModel::cache_area) and
/// [`clear_cache`](GeoidModel::clear_cache) fail with
/// [`GeoidError::ThreadSafe`].
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use geoid::{Interpolation, ThreadSafeGeoid};
///
/// let geoid = Arc::new(ThreadSafeGeoid::open("egm96-5.pgm", Interpolation::Cubic)?);
/// let handles: Vec<_> = (0..4)
///     .map(|i| {
///         let geoid = Arc::clone(&geoid);
///         std::thread::spawn(move || geoid.height(10.0 * i as f64, 20.0))
///     })
///     .collect();
/// ```
#[derive(Debug)]
pub struct ThreadSafeGeoid {
    info: GeoidInfo,
    grid: Grid,
    /// Decoded samples, row-major from the north-west pixel.
    data: Vec<u32>,
}

impl ThreadSafeGeoid {
    /// Load the geoid file at `path` into memory.
    ///
    /// # Errors
    ///
    /// As [`Geoid::open`](crate::Geoid::open), plus
    /// [`GeoidError::Allocation`] if the raster does not fit in memory.
    pub fn open<P: AsRef<Path>>(path: P, interpolation: Interpolation) -> Result<Self> {
        let path = path.as_ref();
        let (file, info) = open_file(path, interpolation)?;
        let header = &info.header;

        let count = header.width.saturating_mul(header.height);
        let mut data: Vec<u32> = Vec::new();
        if data.try_reserve_exact(count).is_err() {
            return Err(GeoidError::Allocation {
                path: path.to_path_buf(),
                bytes: (count as u64).saturating_mul(std::mem::size_of::<u32>() as u64),
            });
        }

        // SAFETY: The map is read-only and dropped before this function
        // returns. The length is checked again below in case the file
        // shrank after its header was validated.
        let map = unsafe { Mmap::map(&file) }.map_err(|source| GeoidError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let start = header.data_start as usize;
        let end = start.saturating_add(header.raster_bytes() as usize);
        let raster = map.get(start..end).ok_or_else(|| GeoidError::Read {
            path: path.to_path_buf(),
            source: std::io::ErrorKind::UnexpectedEof.into(),
        })?;
        let size = header.format.size();
        data.extend(raster.chunks_exact(size).map(|chunk| header.format.decode(chunk)));
        drop(map);
        drop(file);

        debug!(
            path = %path.display(),
            samples = count,
            "Loaded geoid into memory"
        );

        Ok(Self {
            grid: info.grid(),
            info,
            data,
        })
    }

    fn raw_value(&self, ix: i64, iy: i64) -> u32 {
        let (ix, iy) = self.grid.wrap(ix, iy);
        self.data[iy * self.grid.width() + ix]
    }

    fn neighborhood(&self, ix: usize, iy: usize) -> Result<Neighborhood> {
        Neighborhood::fetch(&self.grid, self.info.interpolation, ix, iy, |x, y| {
            Ok(self.raw_value(x, y))
        })
    }

    pub fn info(&self) -> &GeoidInfo {
        &self.info
    }

    /// Geoid height above the WGS84 ellipsoid in meters.
    pub fn height(&self, lat: f64, lon: f64) -> Result<f64> {
        let cell = self.grid.cell(lat, lon)?;
        let nb = self.neighborhood(cell.ix, cell.iy)?;
        let header = &self.info.header;
        Ok(interpolate::height(&nb, &cell, header.offset, header.scale))
    }

    /// Geoid height together with its northward and eastward gradients.
    pub fn undulation(&self, lat: f64, lon: f64) -> Result<Undulation> {
        let cell = self.grid.cell(lat, lon)?;
        let nb = self.neighborhood(cell.ix, cell.iy)?;
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

    /// Convert a height between the ellipsoid and the geoid.
    pub fn convert_height(
        &self,
        lat: f64,
        lon: f64,
        h: f64,
        direction: ConvertDirection,
    ) -> Result<f64> {
        Ok(h + direction.factor() * self.height(lat, lon)?)
    }
}

impl GeoidModel for ThreadSafeGeoid {
    fn info(&self) -> &GeoidInfo {
        &self.info
    }

    fn height(&mut self, lat: f64, lon: f64) -> Result<f64> {
        ThreadSafeGeoid::height(self, lat, lon)
    }

    fn undulation(&mut self, lat: f64, lon: f64) -> Result<Undulation> {
        ThreadSafeGeoid::undulation(self, lat, lon)
    }

    fn cache_area(&mut self, _south: f64, _west: f64, _north: f64, _east: f64) -> Result<()> {
        Err(GeoidError::ThreadSafe)
    }

    fn cache_all(&mut self) -> Result<()> {
        Err(GeoidError::ThreadSafe)
    }

    fn clear_cache(&mut self) -> Result<()> {
        Err(GeoidError::ThreadSafe)
    }

    fn cache_extent(&self) -> Option<BoundingBox> {
        None
    }

    fn is_thread_safe(&self) -> bool {
        true
    }
}
