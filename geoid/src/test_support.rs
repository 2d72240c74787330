//! Fixtures shared by the unit tests: small synthetic geoid files.

use std::fs;
use std::path::{Path, PathBuf};

/// Write a 2-byte geoid file `name.pgm` into `dir`, filling pixel
/// `(col, row)` with `pixel(col, row)`.
pub(crate) fn write_geoid(
    dir: &Path,
    name: &str,
    width: usize,
    height: usize,
    offset: f64,
    scale: f64,
    pixel: impl Fn(usize, usize) -> u16,
) -> PathBuf {
    let mut data = format!(
        "P5\n# Description Test geoid {name}\n# DateTime 2024-01-01 00:00:00\n\
         # Offset {offset}\n# Scale {scale}\n\
         # MaxBilinearError 0.5\n# RMSBilinearError 0.1\n\
         # MaxCubicError 0.25\n# RMSCubicError 0.05\n\
         {width} {height}\n65535\n"
    )
    .into_bytes();
    for row in 0..height {
        for col in 0..width {
            data.extend_from_slice(&pixel(col, row).to_be_bytes());
        }
    }
    let path = dir.join(format!("{name}.pgm"));
    fs::write(&path, data).unwrap();
    path
}

/// The 4 x 3 toy grid with samples `row * 10 + col`.
pub(crate) fn write_toy_geoid(dir: &Path) -> PathBuf {
    write_geoid(dir, "toy", 4, 3, 0.0, 1.0, |col, row| (row * 10 + col) as u16)
}

/// A 5° grid whose samples vary smoothly with position.
pub(crate) fn write_smooth_geoid(dir: &Path) -> PathBuf {
    write_geoid(dir, "smooth", 72, 37, -100.0, 0.01, |col, row| {
        let lon = (col as f64 * 5.0).to_radians();
        let colat = (row as f64 * 5.0).to_radians();
        (10000.0 + 5000.0 * colat.sin() * lon.cos() + 2000.0 * colat.cos()).round() as u16
    })
}
