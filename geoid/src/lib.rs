//! # geoid - Geoid Undulation Library
//!
//! Memory-bounded lookup of geoid heights (undulations) from global grids
//! stored as PGM files, such as the EGM84, EGM96 and EGM2008 models.
//!
//! ## Features
//!
//! - **Lazy**: Samples are read from disk on demand; only the neighborhood
//!   of the last cell queried is kept
//! - **Area Cache**: Optionally hold a geographic rectangle in memory
//! - **Interpolation**: Bilinear or 12-point least-squares cubic, with
//!   analytic gradients
//! - **Thread-Safe Mode**: Load the whole grid once and share it across
//!   threads
//!
//! ## Quick Start
//!
//! ```ignore
//! use geoid::{ConvertDirection, Geoid, GeoidModel, Interpolation};
//!
//! let mut geoid = Geoid::builder("egm96-5")
//!     .directory("/usr/local/share/GeographicLib/geoids")
//!     .interpolation(Interpolation::Cubic)
//!     .build()?;
//!
//! // Height of the geoid above the ellipsoid
//! let n = geoid.height(16.776, -3.009)?;
//!
//! // Ellipsoidal height from GPS to height above mean sea level
//! let h = geoid.convert_height(16.776, -3.009, 300.0, ConvertDirection::EllipsoidToGeoid)?;
//! ```
//!
//! ## Grid Format
//!
//! Each model is a binary PGM image with `width` columns covering 360° of
//! longitude from the prime meridian and `height` rows from the north pole to
//! the south pole. Samples are 16-bit (`.pgm`) or 32-bit (`.pgm4`)
//! big-endian integers, converted to meters with the `Offset` and `Scale`
//! recorded in the header comments.
//!
//! ## Data Sources
//!
//! Download geoid models from:
//! - <https://geographiclib.sourceforge.io/C++/doc/geoid.html>

pub mod area;
pub mod error;
pub mod filename;
#[cfg(feature = "geojson")]
pub mod geojson;
pub mod geoid;
pub mod grid;
pub mod header;
pub mod interpolate;
pub mod model;
mod pixel;
pub mod resident;
pub mod service;
mod stencil;

#[cfg(test)]
mod test_support;

// Re-export main types at crate root for convenience
pub use area::BoundingBox;
pub use error::{GeoidError, Result};
pub use geoid::{Geoid, GeoidBuilder};
pub use header::{GeoidHeader, PixelFormat};
pub use interpolate::{Interpolation, Undulation};
pub use model::{ConvertDirection, GeoidInfo, GeoidModel};
pub use resident::ThreadSafeGeoid;
pub use service::{CacheStats, GeoidService, GeoidServiceBuilder, PreloadStats};
