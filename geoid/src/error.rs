//! Error types for the geoid library.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or querying a geoid model.
#[derive(Error, Debug)]
pub enum GeoidError {
    /// IO error when opening or loading a model file.
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The model file was not found.
    #[error("Geoid file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// The PGM header is malformed or inconsistent with the file size.
    #[error("Invalid geoid file {path}: {reason}")]
    InvalidHeader { path: PathBuf, reason: String },

    /// A raster read failed while servicing a query or filling a cache.
    #[error("Error reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not enough memory to hold the requested samples.
    #[error("Insufficient memory for caching {path} ({bytes} bytes requested)")]
    Allocation { path: PathBuf, bytes: u64 },

    /// Cache management was attempted on a thread-safe (fully loaded) geoid.
    #[error("Attempt to change the cache of a thread-safe geoid")]
    ThreadSafe,

    /// Coordinates are not finite or the latitude is outside [-90°, 90°].
    #[error("Coordinates out of bounds: lat={lat}, lon={lon} (valid: lat ±90°)")]
    OutOfBounds { lat: f64, lon: f64 },

    /// A coordinate in an input geometry is malformed.
    #[error("Invalid coordinate: {message}")]
    InvalidCoordinate { message: String },

    /// A distribution archive could not be used.
    #[error("Invalid archive {path}: {message}")]
    Archive { path: PathBuf, message: String },
}

/// Result type alias using [`GeoidError`].
pub type Result<T> = std::result::Result<T, GeoidError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = GeoidError::InvalidHeader {
            path: PathBuf::from("egm96-5.pgm"),
            reason: "Scale not set".to_string(),
        };
        assert!(err.to_string().contains("egm96-5.pgm"));
        assert!(err.to_string().contains("Scale not set"));

        let err = GeoidError::OutOfBounds {
            lat: 91.0,
            lon: 0.0,
        };
        assert!(err.to_string().contains("91"));

        let err = GeoidError::FileNotFound {
            path: PathBuf::from("egm2008-1.pgm"),
        };
        assert!(err.to_string().contains("egm2008-1.pgm"));
    }

    #[test]
    fn test_read_error_keeps_cause() {
        let err = GeoidError::Read {
            path: PathBuf::from("egm84-15.pgm"),
            source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read"),
        };
        assert!(err.to_string().contains("egm84-15.pgm"));
        assert!(err.source().unwrap().to_string().contains("short read"));
    }
}
