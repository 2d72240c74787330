//! Metadata and the query surface shared by both geoid stores.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::area::BoundingBox;
use crate::error::{GeoidError, Result};
use crate::grid::Grid;
use crate::header::GeoidHeader;
use crate::interpolate::{Interpolation, Undulation, WGS84_A, WGS84_F};

/// Direction of a conversion between ellipsoidal and orthometric heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvertDirection {
    /// Height above the ellipsoid to height above the geoid.
    EllipsoidToGeoid,
    /// Leave the height unchanged.
    None,
    /// Height above the geoid to height above the ellipsoid.
    GeoidToEllipsoid,
}

impl ConvertDirection {
    /// Multiplier applied to the geoid height.
    pub fn factor(&self) -> f64 {
        match self {
            ConvertDirection::EllipsoidToGeoid => -1.0,
            ConvertDirection::None => 0.0,
            ConvertDirection::GeoidToEllipsoid => 1.0,
        }
    }
}

/// Everything known about an opened geoid file.
#[derive(Debug, Clone)]
pub struct GeoidInfo {
    pub(crate) name: String,
    pub(crate) path: PathBuf,
    pub(crate) header: GeoidHeader,
    pub(crate) interpolation: Interpolation,
}

impl GeoidInfo {
    /// Model name: the file name without its extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the model file.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn header(&self) -> &GeoidHeader {
        &self.header
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub(crate) fn grid(&self) -> Grid {
        Grid::new(self.header.width, self.header.height)
    }
}

/// Open a geoid file, parse and validate its header.
///
/// The returned file is positioned somewhere after the header; callers must
/// seek before reading.
pub(crate) fn open_file(path: &Path, interpolation: Interpolation) -> Result<(File, GeoidInfo)> {
    let file = File::open(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            GeoidError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            GeoidError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let header = GeoidHeader::parse(&mut BufReader::new(&file), path)?;
    let len = file
        .metadata()
        .map_err(|source| GeoidError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    header.check_length(len, path)?;

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    debug!(
        path = %path.display(),
        width = header.width,
        height = header.height,
        interpolation = %interpolation,
        "Opened geoid"
    );

    Ok((
        file,
        GeoidInfo {
            name,
            path: path.to_path_buf(),
            header,
            interpolation,
        },
    ))
}

/// Queries and cache management common to [`Geoid`](crate::Geoid) and
/// [`ThreadSafeGeoid`](crate::ThreadSafeGeoid).
///
/// Query methods take `&mut self` because the windowed store updates its
/// caches while answering; the thread-safe store also offers them through
/// `&self` as inherent methods.
pub trait GeoidModel {
    fn info(&self) -> &GeoidInfo;

    /// Geoid height above the WGS84 ellipsoid in meters.
    fn height(&mut self, lat: f64, lon: f64) -> Result<f64>;

    /// Geoid height together with its northward and eastward gradients.
    fn undulation(&mut self, lat: f64, lon: f64) -> Result<Undulation>;

    /// Convert a height between the ellipsoid and the geoid.
    fn convert_height(
        &mut self,
        lat: f64,
        lon: f64,
        h: f64,
        direction: ConvertDirection,
    ) -> Result<f64> {
        Ok(h + direction.factor() * self.height(lat, lon)?)
    }

    /// Hold in memory every sample needed inside the given rectangle.
    fn cache_area(&mut self, south: f64, west: f64, north: f64, east: f64) -> Result<()>;

    /// Hold the whole grid in memory.
    fn cache_all(&mut self) -> Result<()> {
        let world = BoundingBox::world();
        self.cache_area(world.south, world.west, world.north, world.east)
    }

    fn clear_cache(&mut self) -> Result<()>;

    /// Geographic rectangle currently held in memory, if any.
    fn cache_extent(&self) -> Option<BoundingBox>;

    fn is_thread_safe(&self) -> bool;

    fn is_cached(&self) -> bool {
        self.cache_extent().is_some()
    }

    fn description(&self) -> &str {
        &self.info().header.description
    }

    fn datetime(&self) -> &str {
        &self.info().header.datetime
    }

    fn path(&self) -> &Path {
        self.info().path()
    }

    fn name(&self) -> &str {
        self.info().name()
    }

    fn directory(&self) -> &Path {
        self.info().directory()
    }

    fn interpolation(&self) -> Interpolation {
        self.info().interpolation
    }

    fn offset(&self) -> f64 {
        self.info().header.offset
    }

    fn scale(&self) -> f64 {
        self.info().header.scale
    }

    /// Largest interpolation error recorded in the file for the store's
    /// interpolation mode.
    fn max_error(&self) -> Option<f64> {
        let info = self.info();
        info.header.max_error(info.interpolation)
    }

    /// RMS interpolation error recorded in the file for the store's
    /// interpolation mode.
    fn rms_error(&self) -> Option<f64> {
        let info = self.info();
        info.header.rms_error(info.interpolation)
    }

    /// Columns in the grid.
    fn grid_width(&self) -> usize {
        self.info().header.width
    }

    /// Rows in the grid, pole to pole.
    fn grid_height(&self) -> usize {
        self.info().header.height
    }

    /// Equatorial radius of the WGS84 ellipsoid the heights refer to.
    fn major_radius(&self) -> f64 {
        WGS84_A
    }

    fn flattening(&self) -> f64 {
        WGS84_F
    }
}
