//! Interpolation modes and conversion of pixel-space results to heights and
//! gradients.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use crate::grid::{CellPosition, Grid};
use crate::stencil::Neighborhood;

/// Equatorial radius of the WGS84 ellipsoid in meters.
pub const WGS84_A: f64 = 6_378_137.0;
/// Flattening of the WGS84 ellipsoid.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

const DEGREE: f64 = PI / 180.0;

/// How heights are interpolated between grid nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interpolation {
    /// Bilinear interpolation on the four corners of the cell.
    Bilinear,
    /// Least-squares cubic fit to a 12-point stencil.
    #[default]
    Cubic,
}

impl Interpolation {
    pub fn name(&self) -> &'static str {
        match self {
            Interpolation::Bilinear => "bilinear",
            Interpolation::Cubic => "cubic",
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bilinear" => Ok(Interpolation::Bilinear),
            "cubic" => Ok(Interpolation::Cubic),
            other => Err(format!("unknown interpolation '{other}'")),
        }
    }
}

/// Geoid height with its horizontal gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Undulation {
    /// Height of the geoid above the ellipsoid in meters.
    pub height: f64,
    /// Rate of change northward, dimensionless (m/m).
    pub grad_north: f64,
    /// Rate of change eastward, dimensionless (m/m).
    pub grad_east: f64,
}

/// Geoid height at `cell` given the raw-pixel neighborhood of the cell.
pub(crate) fn height(nb: &Neighborhood, cell: &CellPosition, offset: f64, scale: f64) -> f64 {
    offset + scale * nb.value(cell.fx, cell.fy)
}

/// Geoid height and gradient at latitude `lat`.
///
/// Pixel-space slopes are turned into metric ones with the WGS84 meridional
/// and prime-vertical radii of curvature.
pub(crate) fn undulation(
    nb: &Neighborhood,
    cell: &CellPosition,
    grid: &Grid,
    lat: f64,
    offset: f64,
    scale: f64,
) -> Undulation {
    let (fx, fy) = (cell.fx, cell.fy);
    let (sinphi, cosphi) = lat.to_radians().sin_cos();
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let n = 1.0 / (1.0 - e2 * sinphi * sinphi).sqrt();
    // Meters per degree along the meridian, and along the parallel at the
    // equator of the local ellipse
    let meridian = DEGREE * WGS84_A * (1.0 - e2) * n * n * n;
    let parallel = DEGREE * WGS84_A * n;

    let (north, east) = match nb {
        Neighborhood::Bilinear(c) => {
            let north = ((1.0 - fx) * (c.nw - c.sw) + fx * (c.ne - c.se)) * grid.rlatres() / meridian;
            let east = if cosphi > f64::EPSILON.sqrt() {
                ((1.0 - fy) * (c.ne - c.nw) + fy * (c.se - c.sw)) / cosphi
            } else {
                // At a pole use the row away from it
                let delta = if sinphi > 0.0 { c.se - c.sw } else { c.ne - c.nw };
                delta * grid.rlatres() / DEGREE
            };
            (north, east * grid.rlonres() / parallel)
        }
        Neighborhood::Cubic(t) => {
            let dx = t[1]
                + fx * (2.0 * t[3] + 3.0 * fx * t[6])
                + fy * (t[4] + 2.0 * fx * t[7] + fy * t[8]);
            let dy = t[2]
                + fx * (t[4] + fx * t[7])
                + fy * (2.0 * t[5] + 2.0 * fx * t[8] + 3.0 * fy * t[9]);
            // Rows run southward
            (
                -dy * grid.rlatres() / meridian,
                dx * grid.rlonres() / (parallel * cosphi),
            )
        }
    };

    Undulation {
        height: height(nb, cell, offset, scale),
        grad_north: north * scale,
        grad_east: east * scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stencil::Corners;

    fn cell(fx: f64, fy: f64) -> CellPosition {
        CellPosition { ix: 0, iy: 1, fx, fy }
    }

    #[test]
    fn test_interpolation_names() {
        assert_eq!(Interpolation::default(), Interpolation::Cubic);
        assert_eq!(Interpolation::Bilinear.to_string(), "bilinear");
        assert_eq!("CUBIC".parse::<Interpolation>(), Ok(Interpolation::Cubic));
        assert!("nearest".parse::<Interpolation>().is_err());
    }

    #[test]
    fn test_height_applies_offset_and_scale() {
        let nb = Neighborhood::Bilinear(Corners {
            nw: 100.0,
            ne: 100.0,
            sw: 100.0,
            se: 100.0,
        });
        let h = height(&nb, &cell(0.3, 0.7), -108.0, 0.003);
        assert!((h - -107.7).abs() < 1e-9);
    }

    #[test]
    fn test_flat_field_has_no_gradient() {
        let grid = Grid::new(360, 181);
        let flat = [
            Neighborhood::Bilinear(Corners {
                nw: 7.0,
                ne: 7.0,
                sw: 7.0,
                se: 7.0,
            }),
            Neighborhood::Cubic([7.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        ];
        for nb in flat {
            let u = undulation(&nb, &cell(0.25, 0.5), &grid, 45.0, 0.0, 1.0);
            assert_eq!(u.height, 7.0);
            assert_eq!(u.grad_north, 0.0);
            assert_eq!(u.grad_east, 0.0);
        }
    }

    #[test]
    fn test_gradient_signs_and_magnitude() {
        // 1° grid, one meter per pixel, rising northward and eastward
        let grid = Grid::new(360, 181);
        let nb = Neighborhood::Bilinear(Corners {
            nw: 1.0,
            ne: 2.0,
            sw: 0.0,
            se: 1.0,
        });
        let u = undulation(&nb, &cell(0.5, 0.5), &grid, 0.0, 0.0, 1.0);
        assert!(u.grad_north > 0.0);
        assert!(u.grad_east > 0.0);
        // Roughly one meter per degree of arc, about 111 km at the equator
        assert!((1.0 / u.grad_north - 110_574.0).abs() < 10.0);
        assert!((1.0 / u.grad_east - 111_319.5).abs() < 1.0);

        // The same slope in cubic form
        let cubic = Neighborhood::Cubic([1.0, 1.0, -1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let v = undulation(&cubic, &cell(0.5, 0.5), &grid, 0.0, 0.0, 1.0);
        assert!((v.grad_north - u.grad_north).abs() < 1e-15);
        assert!((v.grad_east - u.grad_east).abs() < 1e-15);
    }

    #[test]
    fn test_bilinear_east_gradient_at_pole_is_finite() {
        let grid = Grid::new(360, 181);
        let nb = Neighborhood::Bilinear(Corners {
            nw: 5.0,
            ne: 5.0,
            sw: 4.0,
            se: 6.0,
        });
        let u = undulation(&nb, &cell(0.5, 0.0), &grid, 90.0, 0.0, 1.0);
        assert!(u.grad_east.is_finite());
        assert!(u.grad_east > 0.0);
    }
}
