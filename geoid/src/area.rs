//! In-memory rectangular window of the raster.
//!
//! An [`AreaCache`] holds every sample needed to evaluate heights inside a
//! geographic rectangle so that queries there never touch the disk. The
//! window may straddle the prime meridian in pixel space; rows always lie
//! inside the grid.

use tracing::debug;

use crate::error::{GeoidError, Result};
use crate::grid::{normalize_longitude, Grid};
use crate::interpolate::Interpolation;
use crate::pixel::PixelFile;

/// A geographic rectangle in decimal degrees.
///
/// `west` and `east` are meridians; the rectangle runs eastward from `west`
/// to `east`, so `west > east` describes an area crossing the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Southern boundary latitude.
    pub south: f64,
    /// Western boundary longitude.
    pub west: f64,
    /// Northern boundary latitude.
    pub north: f64,
    /// Eastern boundary longitude.
    pub east: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// The whole globe.
    pub fn world() -> Self {
        Self::new(-90.0, 0.0, 90.0, 360.0)
    }

    /// Check whether `(lat, lon)` lies inside the box, with `west` and
    /// `north` inclusive. Coinciding meridians span the whole globe.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if lat < self.south || lat > self.north {
            return false;
        }
        let span = (self.east - self.west).rem_euclid(360.0);
        span == 0.0 || (lon - self.west).rem_euclid(360.0) < span
    }
}

/// Pixel rectangle covered by a cache window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    xoffset: usize,
    yoffset: usize,
    xsize: usize,
    ysize: usize,
}

#[derive(Debug)]
pub(crate) struct AreaCache {
    window: Window,
    /// Geographic area the window was sized for.
    extent: BoundingBox,
    /// `ysize` rows of `xsize` samples.
    data: Vec<u32>,
}

impl AreaCache {
    /// Read every sample needed to interpolate inside `bounds`.
    ///
    /// Nothing is returned unless the whole window was allocated and read.
    pub(crate) fn load(
        grid: &Grid,
        interpolation: Interpolation,
        bounds: BoundingBox,
        pixels: &mut PixelFile,
    ) -> Result<Self> {
        let (window, extent) = window_for(grid, interpolation, bounds);

        let count = window.xsize * window.ysize;
        let mut data: Vec<u32> = Vec::new();
        if data.try_reserve_exact(count).is_err() {
            return Err(GeoidError::Allocation {
                path: pixels.path().to_path_buf(),
                bytes: (count * std::mem::size_of::<u32>()) as u64,
            });
        }
        data.resize(count, 0);

        let width = grid.width();
        // Columns from xoffset to the right edge, then wrapped from column 0
        let first = window.xsize.min(width - window.xoffset);
        for (row, chunk) in data.chunks_exact_mut(window.xsize).enumerate() {
            let iy = window.yoffset + row;
            let (head, tail) = chunk.split_at_mut(first);
            pixels.read_run(window.xoffset, iy, head)?;
            if !tail.is_empty() {
                pixels.read_run(0, iy, tail)?;
            }
        }

        debug!(
            south = extent.south,
            west = extent.west,
            north = extent.north,
            east = extent.east,
            xsize = window.xsize,
            ysize = window.ysize,
            "Area cache filled"
        );

        Ok(Self {
            window,
            extent,
            data,
        })
    }

    /// Look up a stored pixel, or `None` if it lies outside the window.
    pub(crate) fn get(&self, ix: usize, iy: usize, width: usize) -> Option<u32> {
        let w = &self.window;
        if iy < w.yoffset || iy >= w.yoffset + w.ysize {
            return None;
        }
        let dx = (ix + width - w.xoffset) % width;
        if dx >= w.xsize {
            return None;
        }
        Some(self.data[(iy - w.yoffset) * w.xsize + dx])
    }

    /// Geographic area covered: `west` and `north` edges inclusive, `east`
    /// and `south` exclusive (except at the south pole).
    pub(crate) fn extent(&self) -> BoundingBox {
        self.extent
    }
}

/// Size the pixel window for `bounds`, padding one pixel on every side in
/// cubic mode so that the whole 12-point stencil is resident.
fn window_for(grid: &Grid, interpolation: Interpolation, bounds: BoundingBox) -> (Window, BoundingBox) {
    let width = grid.width() as i64;
    let height = grid.height() as i64;
    let equator = (height - 1) / 2;
    let pad = match interpolation {
        Interpolation::Bilinear => 0,
        Interpolation::Cubic => 1,
    };

    let west = normalize_longitude(bounds.west);
    let mut east = normalize_longitude(bounds.east);
    if east <= west {
        east += 360.0;
    }

    let iw = (west * grid.rlonres()).floor() as i64;
    let ie = (east * grid.rlonres()).floor() as i64 + 1;
    let row_n = ((-bounds.north * grid.rlatres()).floor() as i64 + equator).clamp(0, height - 2);
    let row_s = ((-bounds.south * grid.rlatres()).floor() as i64 + equator).clamp(0, height - 2) + 1;

    let full_width = ie - iw + 2 * pad >= width - 1;
    let (xoffset, xsize, extent_west, extent_east) = if full_width {
        (0, width, 0.0, 360.0)
    } else {
        let west_col = iw.rem_euclid(width);
        let xoffset = (west_col - pad).rem_euclid(width);
        let extent_west = ((west_col + width / 2) % width - width / 2) as f64 / grid.rlonres();
        (
            xoffset,
            ie - iw + 1 + 2 * pad,
            extent_west,
            extent_west + (ie - iw) as f64 / grid.rlonres(),
        )
    };

    let yoffset = (row_n - pad).max(0);
    let ylast = (row_s + pad).min(height - 1);

    let window = Window {
        xoffset: xoffset as usize,
        yoffset: yoffset as usize,
        xsize: xsize as usize,
        ysize: (ylast - yoffset + 1) as usize,
    };
    let extent = BoundingBox::new(
        90.0 - row_s as f64 / grid.rlatres(),
        extent_west,
        90.0 - row_n as f64 / grid.rlatres(),
        extent_east,
    );
    (window, extent)
}
