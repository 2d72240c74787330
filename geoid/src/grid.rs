//! Grid geometry and pixel addressing.
//!
//! A geoid grid covers the whole globe. Column 0 lies on the prime meridian
//! and columns wrap every 360°; row 0 is the north pole and row
//! `height - 1` the south pole. Addresses that fall off the top or bottom of
//! the grid are reflected through the pole onto the antipodal meridian.

use crate::error::{GeoidError, Result};

/// Normalize a longitude into `[-180, 180)`.
pub fn normalize_longitude(lon: f64) -> f64 {
    let x = lon % 360.0;
    if x < -180.0 {
        x + 360.0
    } else if x >= 180.0 {
        x - 360.0
    } else {
        x
    }
}

/// Position of a query inside the grid: the north-west corner `(ix, iy)` of
/// the containing cell and the fractional offsets `fx` (eastward) and `fy`
/// (southward) from that corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellPosition {
    pub ix: usize,
    pub iy: usize,
    pub fx: f64,
    pub fy: f64,
}

/// Dimensions and resolution of a global grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    /// Pixels per degree of longitude.
    rlonres: f64,
    /// Pixels per degree of latitude.
    rlatres: f64,
}

impl Grid {
    /// Create a grid. The header parser guarantees `width` is even and
    /// `height` is odd and both are at least 2.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rlonres: width as f64 / 360.0,
            rlatres: (height - 1) as f64 / 180.0,
        }
    }

    /// Number of columns (one full turn of longitude).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows, pole to pole inclusive.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixels per degree of longitude.
    pub fn rlonres(&self) -> f64 {
        self.rlonres
    }

    /// Pixels per degree of latitude.
    pub fn rlatres(&self) -> f64 {
        self.rlatres
    }

    /// Row of the equator.
    fn equator(&self) -> i64 {
        ((self.height - 1) / 2) as i64
    }

    /// Locate the cell containing `(lat, lon)`.
    ///
    /// Points on a lattice node belong to the cell whose north-west corner
    /// they are. The south pole is assigned to the last row of cells with
    /// `fy == 1`.
    pub fn cell(&self, lat: f64, lon: f64) -> Result<CellPosition> {
        if !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(GeoidError::OutOfBounds { lat, lon });
        }

        // Multiply before dividing so that lattice nodes land on integers
        let fx = normalize_longitude(lon) * self.width as f64 / 360.0;
        let fy = -lat * (self.height - 1) as f64 / 180.0;
        let ix = fx.floor() as i64;
        let iy = (fy.floor() as i64).min(self.equator() - 1);

        Ok(CellPosition {
            ix: ix.rem_euclid(self.width as i64) as usize,
            iy: (iy + self.equator()) as usize,
            fx: fx - ix as f64,
            fy: fy - iy as f64,
        })
    }

    /// Map a possibly out-of-range pixel address onto a stored pixel.
    ///
    /// Columns wrap modulo the width. Rows beyond a pole are mirrored about
    /// that pole and moved half a turn in longitude, which lands exactly on
    /// the antipodal meridian because the width is even.
    pub fn wrap(&self, ix: i64, iy: i64) -> (usize, usize) {
        let width = self.width as i64;
        let height = self.height as i64;
        let mut ix = ix.rem_euclid(width);
        let mut iy = iy;
        if iy < 0 || iy >= height {
            iy = if iy < 0 { -iy } else { 2 * (height - 1) - iy };
            ix += if ix < width / 2 { width / 2 } else { -width / 2 };
        }
        (ix as usize, iy as usize)
    }
}
