//! Interpolation neighborhoods and the single-cell cache.
//!
//! Bilinear interpolation needs the four corners of a cell. Cubic
//! interpolation fits the ten coefficients of a bivariate cubic to the
//! twelve samples around the cell:
//!
//! ```text
//!         .  0  1  .
//!         2  3  4  5
//!         6  7  8  9
//!         . 10 11  .
//! ```
//!
//! where sample 3 is the north-west corner `(ix, iy)`. The fit is a
//! weighted least-squares fit with the four inner samples counted twice. In
//! the two rows of cells touching a pole the cubic is further constrained to
//! be constant along the pole, which needs its own table.

use crate::error::Result;
use crate::grid::Grid;
use crate::interpolate::Interpolation;

pub(crate) const STENCIL_SIZE: usize = 12;
/// Coefficients of a bivariate cubic, in the order
/// `1, x, y, x², xy, y², x³, x²y, xy², y³`.
pub(crate) const NTERMS: usize = 10;

/// Offsets `(dx, dy)` of the stencil samples from the north-west corner.
const STENCIL: [(i64, i64); STENCIL_SIZE] = [
    (0, -1),
    (1, -1),
    (-1, 0),
    (0, 0),
    (1, 0),
    (2, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (2, 1),
    (0, 2),
    (1, 2),
];

const C0: f64 = 240.0;
#[rustfmt::skip]
const C3: [[f64; NTERMS]; STENCIL_SIZE] = [
    [  9.0, -18.0, -88.0,    0.0,  96.0,   90.0,   0.0,   0.0, -60.0, -20.0],
    [ -9.0,  18.0,   8.0,    0.0, -96.0,   30.0,   0.0,   0.0,  60.0, -20.0],
    [  9.0, -88.0, -18.0,   90.0,  96.0,    0.0, -20.0, -60.0,   0.0,   0.0],
    [186.0, -42.0, -42.0, -150.0, -96.0, -150.0,  60.0,  60.0,  60.0,  60.0],
    [ 54.0, 162.0, -78.0,   30.0, -24.0,  -90.0, -60.0,  60.0, -60.0,  60.0],
    [ -9.0, -32.0,  18.0,   30.0,  24.0,    0.0,  20.0, -60.0,   0.0,   0.0],
    [ -9.0,   8.0,  18.0,   30.0, -96.0,    0.0, -20.0,  60.0,   0.0,   0.0],
    [ 54.0, -78.0, 162.0,  -90.0, -24.0,   30.0,  60.0, -60.0,  60.0, -60.0],
    [-54.0,  78.0,  78.0,   90.0, 144.0,   90.0, -60.0, -60.0, -60.0, -60.0],
    [  9.0,  -8.0, -18.0,  -30.0, -24.0,    0.0,  20.0,  60.0,   0.0,   0.0],
    [ -9.0,  18.0, -32.0,    0.0,  24.0,   30.0,   0.0,   0.0, -60.0,  20.0],
    [  9.0, -18.0,  -8.0,    0.0, -24.0,  -30.0,   0.0,   0.0,  60.0,  20.0],
];

const C0N: f64 = 372.0;
#[rustfmt::skip]
const C3N: [[f64; NTERMS]; STENCIL_SIZE] = [
    [  0.0, 0.0, -131.0, 0.0,  138.0,  144.0, 0.0,   0.0, -102.0, -31.0],
    [  0.0, 0.0,    7.0, 0.0, -138.0,   42.0, 0.0,   0.0,  102.0, -31.0],
    [ 62.0, 0.0,  -31.0, 0.0,    0.0,  -62.0, 0.0,   0.0,    0.0,  31.0],
    [124.0, 0.0,  -62.0, 0.0,    0.0, -124.0, 0.0,   0.0,    0.0,  62.0],
    [124.0, 0.0,  -62.0, 0.0,    0.0, -124.0, 0.0,   0.0,    0.0,  62.0],
    [ 62.0, 0.0,  -31.0, 0.0,    0.0,  -62.0, 0.0,   0.0,    0.0,  31.0],
    [  0.0, 0.0,   45.0, 0.0, -183.0,   -9.0, 0.0,  93.0,   18.0,   0.0],
    [  0.0, 0.0,  216.0, 0.0,   33.0,   87.0, 0.0, -93.0,   12.0, -93.0],
    [  0.0, 0.0,  156.0, 0.0,  153.0,   99.0, 0.0, -93.0,  -12.0, -93.0],
    [  0.0, 0.0,  -45.0, 0.0,   -3.0,    9.0, 0.0,  93.0,  -18.0,   0.0],
    [  0.0, 0.0,  -55.0, 0.0,   48.0,   42.0, 0.0,   0.0,  -84.0,  31.0],
    [  0.0, 0.0,   -7.0, 0.0,  -48.0,  -42.0, 0.0,   0.0,   84.0,  31.0],
];

const C0S: f64 = 372.0;
#[rustfmt::skip]
const C3S: [[f64; NTERMS]; STENCIL_SIZE] = [
    [ 18.0,  -36.0, -122.0,   0.0,  120.0,  135.0, 0.0,   0.0,  -84.0, -31.0],
    [-18.0,   36.0,   -2.0,   0.0, -120.0,   51.0, 0.0,   0.0,   84.0, -31.0],
    [ 36.0, -165.0,  -27.0,  93.0,  147.0,   -9.0, 0.0, -93.0,   18.0,   0.0],
    [210.0,   45.0, -111.0, -93.0,  -57.0, -192.0, 0.0,  93.0,   12.0,  93.0],
    [162.0,  141.0,  -75.0, -93.0, -129.0, -180.0, 0.0,  93.0,  -12.0,  93.0],
    [-36.0,  -21.0,   27.0,  93.0,   39.0,    9.0, 0.0, -93.0,  -18.0,   0.0],
    [  0.0,    0.0,   62.0,   0.0,    0.0,   31.0, 0.0,   0.0,    0.0, -31.0],
    [  0.0,    0.0,  124.0,   0.0,    0.0,   62.0, 0.0,   0.0,    0.0, -62.0],
    [  0.0,    0.0,  124.0,   0.0,    0.0,   62.0, 0.0,   0.0,    0.0, -62.0],
    [  0.0,    0.0,   62.0,   0.0,    0.0,   31.0, 0.0,   0.0,    0.0, -31.0],
    [-18.0,   36.0,  -64.0,   0.0,   66.0,   51.0, 0.0,   0.0, -102.0,  31.0],
    [ 18.0,  -36.0,    2.0,   0.0,  -66.0,  -51.0, 0.0,   0.0,  102.0,  31.0],
];

/// Which fitting table applies to a row of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StencilRow {
    Interior,
    /// Cells whose north edge is the north pole.
    North,
    /// Cells whose south edge is the south pole.
    South,
}

impl StencilRow {
    pub(crate) fn for_row(iy: usize, height: usize) -> Self {
        if iy == 0 {
            StencilRow::North
        } else if iy == height - 2 {
            StencilRow::South
        } else {
            StencilRow::Interior
        }
    }

    fn table(self) -> (&'static [[f64; NTERMS]; STENCIL_SIZE], f64) {
        match self {
            StencilRow::Interior => (&C3, C0),
            StencilRow::North => (&C3N, C0N),
            StencilRow::South => (&C3S, C0S),
        }
    }

    /// Fit the cubic coefficients to the stencil samples `v`.
    pub(crate) fn fit(self, v: &[f64; STENCIL_SIZE]) -> [f64; NTERMS] {
        let (table, denominator) = self.table();
        let mut t = [0.0; NTERMS];
        for (i, term) in t.iter_mut().enumerate() {
            *term = v
                .iter()
                .zip(table.iter())
                .map(|(value, row)| value * row[i])
                .sum::<f64>()
                / denominator;
        }
        t
    }
}

/// Raw pixel values at the corners of a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Corners {
    pub nw: f64,
    pub ne: f64,
    pub sw: f64,
    pub se: f64,
}

/// Everything needed to interpolate anywhere inside one cell, in pixel
/// units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Neighborhood {
    Bilinear(Corners),
    Cubic([f64; NTERMS]),
}

impl Neighborhood {
    /// Gather the samples around the cell with north-west corner `(ix, iy)`
    /// through `raw` and build its neighborhood.
    pub(crate) fn fetch(
        grid: &Grid,
        interpolation: Interpolation,
        ix: usize,
        iy: usize,
        mut raw: impl FnMut(i64, i64) -> Result<u32>,
    ) -> Result<Self> {
        let (x, y) = (ix as i64, iy as i64);
        match interpolation {
            Interpolation::Bilinear => Ok(Neighborhood::Bilinear(Corners {
                nw: raw(x, y)? as f64,
                ne: raw(x + 1, y)? as f64,
                sw: raw(x, y + 1)? as f64,
                se: raw(x + 1, y + 1)? as f64,
            })),
            Interpolation::Cubic => {
                let mut v = [0.0; STENCIL_SIZE];
                for (value, (dx, dy)) in v.iter_mut().zip(STENCIL) {
                    *value = raw(x + dx, y + dy)? as f64;
                }
                let row = StencilRow::for_row(iy, grid.height());
                Ok(Neighborhood::Cubic(row.fit(&v)))
            }
        }
    }

    /// Interpolated pixel value at fractional position `(fx, fy)`.
    pub(crate) fn value(&self, fx: f64, fy: f64) -> f64 {
        match self {
            Neighborhood::Bilinear(c) => {
                let north = (1.0 - fx) * c.nw + fx * c.ne;
                let south = (1.0 - fx) * c.sw + fx * c.se;
                (1.0 - fy) * north + fy * south
            }
            Neighborhood::Cubic(t) => {
                t[0] + fx * (t[1] + fx * (t[3] + fx * t[6]))
                    + fy * (t[2] + fx * (t[4] + fx * t[7]) + fy * (t[5] + fx * t[8] + fy * t[9]))
            }
        }
    }
}

/// The neighborhood of the most recently evaluated cell.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CellCache {
    pub ix: usize,
    pub iy: usize,
    pub neighborhood: Neighborhood,
}

impl CellCache {
    /// The cached neighborhood, if it belongs to cell `(ix, iy)`.
    pub(crate) fn lookup(&self, ix: usize, iy: usize) -> Option<Neighborhood> {
        (self.ix == ix && self.iy == iy).then_some(self.neighborhood)
    }
}
