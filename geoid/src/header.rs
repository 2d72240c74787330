//! PGM header parsing.
//!
//! Geoid grids are stored as binary PGM ("P5") images whose comment lines
//! carry the metadata needed to turn pixels into heights:
//!
//! ```text
//! P5
//! # Description WGS84 EGM96, 5-minute grid
//! # DateTime 2009-08-29 18:45:00
//! # Offset -108
//! # Scale 0.003
//! # MaxBilinearError 0.140
//! # RMSBilinearError 0.005
//! # MaxCubicError 0.003
//! # RMSCubicError 0.001
//! 4320 2161
//! 65535
//! <raster>
//! ```
//!
//! The raster holds `width * height` big-endian samples starting with the
//! north-west pixel. Samples are 2 bytes wide when maxval is 65535 and
//! 4 bytes wide when maxval is 4294967295.

use std::io::BufRead;
use std::path::Path;

use crate::error::{GeoidError, Result};
use crate::interpolate::Interpolation;

/// Width of a raster sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 2-byte samples, maxval 65535 (`.pgm`).
    U16,
    /// 4-byte samples, maxval 4294967295 (`.pgm4`).
    U32,
}

impl PixelFormat {
    /// Determine the sample width from the header maxval.
    pub fn from_maxval(maxval: u64) -> Option<Self> {
        match maxval {
            0xffff => Some(PixelFormat::U16),
            0xffff_ffff => Some(PixelFormat::U32),
            _ => None,
        }
    }

    /// Number of bytes per sample.
    pub fn size(&self) -> usize {
        match self {
            PixelFormat::U16 => 2,
            PixelFormat::U32 => 4,
        }
    }

    /// Largest representable sample.
    pub fn max_value(&self) -> u32 {
        match self {
            PixelFormat::U16 => u16::MAX as u32,
            PixelFormat::U32 => u32::MAX,
        }
    }

    /// File extension used for models stored with this sample width.
    pub fn extension(&self) -> &'static str {
        match self {
            PixelFormat::U16 => "pgm",
            PixelFormat::U32 => "pgm4",
        }
    }

    /// Decode one big-endian sample. `bytes` must hold exactly
    /// [`size`](Self::size) bytes.
    pub fn decode(&self, bytes: &[u8]) -> u32 {
        match self {
            PixelFormat::U16 => u16::from_be_bytes([bytes[0], bytes[1]]) as u32,
            PixelFormat::U32 => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }
}

/// Metadata read from the header of a geoid file.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoidHeader {
    /// Free-text description, `"NONE"` if absent.
    pub description: String,
    /// Creation date, `"UNKNOWN"` if absent.
    pub datetime: String,
    /// Height of pixel value 0 (meters).
    pub offset: f64,
    /// Meters per pixel unit.
    pub scale: f64,
    pub max_bilinear_error: Option<f64>,
    pub rms_bilinear_error: Option<f64>,
    pub max_cubic_error: Option<f64>,
    pub rms_cubic_error: Option<f64>,
    /// Pixels per row.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    pub format: PixelFormat,
    /// Byte offset of the first raster sample.
    pub data_start: u64,
}

impl GeoidHeader {
    /// Parse the header from `reader`, which must be positioned at the start
    /// of the file. `path` is only used for error messages.
    ///
    /// This validates the header fields but not the file length; see
    /// [`check_length`](Self::check_length).
    pub fn parse<R: BufRead>(reader: &mut R, path: &Path) -> Result<Self> {
        let invalid = |reason: &str| GeoidError::InvalidHeader {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        let io_error = |source: std::io::Error| GeoidError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut consumed = 0u64;
        let mut line = String::new();

        consumed += reader.read_line(&mut line).map_err(io_error)? as u64;
        if line.trim_end_matches(['\r', '\n']) != "P5" {
            return Err(invalid("File not in PGM format"));
        }

        let mut description = "NONE".to_string();
        let mut datetime = "UNKNOWN".to_string();
        let mut offset = None;
        let mut scale = None;
        let mut max_bilinear_error = None;
        let mut rms_bilinear_error = None;
        let mut max_cubic_error = None;
        let mut rms_cubic_error = None;
        let mut dimensions = None;

        loop {
            line.clear();
            let n = reader.read_line(&mut line).map_err(io_error)?;
            if n == 0 {
                break;
            }
            consumed += n as u64;
            let text = line.trim_end_matches(['\r', '\n']);
            if text.trim().is_empty() {
                continue;
            }

            if let Some(comment) = text.strip_prefix('#') {
                let comment = comment.trim_start();
                let (key, value) = match comment.split_once([' ', '\t']) {
                    Some((key, value)) => (key, value.trim()),
                    None => (comment, ""),
                };
                match key {
                    "Description" if !value.is_empty() => description = value.to_string(),
                    "DateTime" if !value.is_empty() => datetime = value.to_string(),
                    "Offset" => {
                        offset = Some(parse_real(value).ok_or_else(|| invalid("Error reading offset"))?)
                    }
                    "Scale" => {
                        scale = Some(parse_real(value).ok_or_else(|| invalid("Error reading scale"))?)
                    }
                    // Missing or garbled error estimates are not fatal
                    "MaxBilinearError" => max_bilinear_error = parse_real(value),
                    "RMSBilinearError" => rms_bilinear_error = parse_real(value),
                    "MaxCubicError" => max_cubic_error = parse_real(value),
                    "RMSCubicError" => rms_cubic_error = parse_real(value),
                    _ => {}
                }
            } else {
                let mut fields = text.split_whitespace();
                let width = fields.next().and_then(|s| s.parse::<usize>().ok());
                let height = fields.next().and_then(|s| s.parse::<usize>().ok());
                match (width, height) {
                    (Some(w), Some(h)) => dimensions = Some((w, h, fields.next().map(str::to_string))),
                    _ => return Err(invalid("Error reading raster size")),
                }
                break;
            }
        }

        let (width, height, inline_maxval) =
            dimensions.ok_or_else(|| invalid("Error reading raster size"))?;

        // maxval is normally on its own line; a single whitespace byte
        // separates it from the raster
        let maxval_text = match inline_maxval {
            Some(text) => text,
            None => {
                line.clear();
                consumed += reader.read_line(&mut line).map_err(io_error)? as u64;
                line.trim().to_string()
            }
        };
        let maxval: u64 = maxval_text
            .parse()
            .map_err(|_| invalid("Error reading maxval"))?;
        let format =
            PixelFormat::from_maxval(maxval).ok_or_else(|| invalid("Incorrect value of maxval"))?;

        let offset = offset.ok_or_else(|| invalid("Offset not set"))?;
        let scale = scale.ok_or_else(|| invalid("Scale not set"))?;
        if scale == 0.0 {
            return Err(invalid("Scale not set"));
        }
        if scale < 0.0 {
            return Err(invalid("Scale must be positive"));
        }
        if width < 2 || height < 2 {
            return Err(invalid("Raster size too small"));
        }
        if width % 2 == 1 {
            // Needed for the longitude shift when reflecting through a pole
            return Err(invalid("Raster width is odd"));
        }
        if height % 2 == 0 {
            // The latitude grid must include the equator
            return Err(invalid("Raster height is even"));
        }
        if raster_len(format, width, height)
            .and_then(|bytes| bytes.checked_add(consumed))
            .is_none()
        {
            return Err(invalid("Raster size too large"));
        }

        Ok(Self {
            description,
            datetime,
            offset,
            scale,
            max_bilinear_error,
            rms_bilinear_error,
            max_cubic_error,
            rms_cubic_error,
            width,
            height,
            format,
            data_start: consumed,
        })
    }

    /// Number of raster bytes following the header, saturating at
    /// `u64::MAX` for dimensions no parsed header can have.
    pub fn raster_bytes(&self) -> u64 {
        raster_len(self.format, self.width, self.height).unwrap_or(u64::MAX)
    }

    /// Verify that a file of `len` bytes holds exactly one raster.
    pub fn check_length(&self, len: u64, path: &Path) -> Result<()> {
        let expected = raster_len(self.format, self.width, self.height)
            .and_then(|bytes| bytes.checked_add(self.data_start))
            .ok_or_else(|| GeoidError::InvalidHeader {
                path: path.to_path_buf(),
                reason: "Raster size too large".to_string(),
            })?;
        if expected != len {
            return Err(GeoidError::InvalidHeader {
                path: path.to_path_buf(),
                reason: format!(
                    "File has the wrong length: {} bytes (expected {})",
                    len, expected
                ),
            });
        }
        Ok(())
    }

    /// Maximum interpolation error recorded for `interpolation`.
    pub fn max_error(&self, interpolation: Interpolation) -> Option<f64> {
        match interpolation {
            Interpolation::Bilinear => self.max_bilinear_error,
            Interpolation::Cubic => self.max_cubic_error,
        }
    }

    /// RMS interpolation error recorded for `interpolation`.
    pub fn rms_error(&self, interpolation: Interpolation) -> Option<f64> {
        match interpolation {
            Interpolation::Bilinear => self.rms_bilinear_error,
            Interpolation::Cubic => self.rms_cubic_error,
        }
    }
}

fn raster_len(format: PixelFormat, width: usize, height: usize) -> Option<u64> {
    (format.size() as u64)
        .checked_mul(width as u64)?
        .checked_mul(height as u64)
}

fn parse_real(value: &str) -> Option<f64> {
    value.split_whitespace().next()?.parse().ok()
}
