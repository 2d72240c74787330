//! Geoid model file naming and default locations.
//!
//! A model named `name` is stored as `name.pgm` (2-byte samples) or
//! `name.pgm4` (4-byte samples). Distributed model names combine the
//! gravity model and the grid spacing in arc minutes, with `_` standing for
//! the decimal point:
//!
//! - `egm84-30`, `egm84-15`
//! - `egm96-15`, `egm96-5`
//! - `egm2008-5`, `egm2008-2_5`, `egm2008-1`

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{GeoidError, Result};
use crate::header::PixelFormat;

/// Directory used when neither `GEOID_PATH` nor `GEOGRAPHICLIB_DATA` is set.
pub const FALLBACK_GEOID_PATH: &str = "/usr/local/share/GeographicLib/geoids";

/// Model used when `GEOID_NAME` is not set.
pub const FALLBACK_GEOID_NAME: &str = "egm96-5";

/// Models published for download.
pub const KNOWN_MODELS: [&str; 7] = [
    "egm84-30",
    "egm84-15",
    "egm96-15",
    "egm96-5",
    "egm2008-5",
    "egm2008-2_5",
    "egm2008-1",
];

/// Default directory for geoid files.
///
/// This is `$GEOID_PATH` if set, otherwise `$GEOGRAPHICLIB_DATA/geoids` if
/// `GEOGRAPHICLIB_DATA` is set, otherwise [`FALLBACK_GEOID_PATH`].
pub fn default_geoid_path() -> PathBuf {
    if let Some(path) = env::var_os("GEOID_PATH").filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    if let Some(data) = env::var_os("GEOGRAPHICLIB_DATA").filter(|p| !p.is_empty()) {
        return PathBuf::from(data).join("geoids");
    }
    PathBuf::from(FALLBACK_GEOID_PATH)
}

/// Default model name: `$GEOID_NAME` if set, otherwise
/// [`FALLBACK_GEOID_NAME`].
pub fn default_geoid_name() -> String {
    env::var("GEOID_NAME")
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_GEOID_NAME.to_string())
}

/// File name of model `name` stored with samples of `format`.
///
/// # Examples
///
/// ```
/// use geoid::filename::model_filename;
/// use geoid::PixelFormat;
///
/// assert_eq!(model_filename("egm96-5", PixelFormat::U16), "egm96-5.pgm");
/// assert_eq!(model_filename("egm2008-1", PixelFormat::U32), "egm2008-1.pgm4");
/// ```
pub fn model_filename(name: &str, format: PixelFormat) -> String {
    format!("{}.{}", name, format.extension())
}

/// Extract the model name from a file name or path ending in `.pgm` or
/// `.pgm4`.
///
/// # Examples
///
/// ```
/// use geoid::filename::model_name_from_filename;
///
/// assert_eq!(model_name_from_filename("egm96-5.pgm"), Some("egm96-5"));
/// assert_eq!(model_name_from_filename("/data/egm2008-1.pgm4"), Some("egm2008-1"));
/// assert_eq!(model_name_from_filename("egm96-5.zip"), None);
/// ```
pub fn model_name_from_filename(filename: &str) -> Option<&str> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let stem = name
        .strip_suffix(".pgm4")
        .or_else(|| name.strip_suffix(".pgm"))?;
    (!stem.is_empty()).then_some(stem)
}

/// Gravity model and grid spacing encoded in a model name.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelName {
    /// Gravity model, e.g. `egm2008`.
    pub model: String,
    /// Grid spacing in arc minutes.
    pub spacing_minutes: f64,
}

impl ModelName {
    /// Grid spacing in degrees.
    pub fn spacing_degrees(&self) -> f64 {
        self.spacing_minutes / 60.0
    }
}

/// Split a model name such as `egm2008-2_5` into its gravity model and grid
/// spacing.
///
/// # Examples
///
/// ```
/// use geoid::filename::parse_model_name;
///
/// let parsed = parse_model_name("egm2008-2_5").unwrap();
/// assert_eq!(parsed.model, "egm2008");
/// assert_eq!(parsed.spacing_minutes, 2.5);
/// assert!(parse_model_name("custom").is_none());
/// ```
pub fn parse_model_name(name: &str) -> Option<ModelName> {
    let (model, spacing) = name.rsplit_once('-')?;
    if model.is_empty() {
        return None;
    }
    let spacing_minutes: f64 = spacing.replace('_', ".").parse().ok()?;
    if !(spacing_minutes.is_finite() && spacing_minutes > 0.0) {
        return None;
    }
    Some(ModelName {
        model: model.to_string(),
        spacing_minutes,
    })
}

/// Locate model `name` in `directory`, trying `name.pgm` then `name.pgm4`.
///
/// # Errors
///
/// [`GeoidError::FileNotFound`] naming the `.pgm` path if neither exists.
pub fn find_model(directory: &Path, name: &str) -> Result<PathBuf> {
    let candidates = [PixelFormat::U16, PixelFormat::U32]
        .map(|format| directory.join(model_filename(name, format)));
    match candidates.iter().find(|path| path.is_file()) {
        Some(path) => Ok(path.clone()),
        None => Err(GeoidError::FileNotFound {
            path: candidates[0].clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_model_filename() {
        assert_eq!(model_filename("egm84-15", PixelFormat::U16), "egm84-15.pgm");
        assert_eq!(model_filename("egm84-15", PixelFormat::U32), "egm84-15.pgm4");
    }

    #[test]
    fn test_model_name_from_filename() {
        assert_eq!(model_name_from_filename("egm96-15.pgm"), Some("egm96-15"));
        assert_eq!(
            model_name_from_filename("C:\\geoids\\egm2008-5.pgm"),
            Some("egm2008-5")
        );
        assert_eq!(model_name_from_filename(".pgm"), None);
        assert_eq!(model_name_from_filename("egm96-15.pgm.aux.xml"), None);
        assert_eq!(model_name_from_filename("readme.txt"), None);
    }

    #[test]
    fn test_parse_known_models() {
        for name in KNOWN_MODELS {
            let parsed = parse_model_name(name).unwrap();
            assert!(parsed.model.starts_with("egm"), "{name}");
        }
        let parsed = parse_model_name("egm84-30").unwrap();
        assert_eq!(parsed.model, "egm84");
        assert_eq!(parsed.spacing_degrees(), 0.5);
        assert_eq!(parse_model_name("egm2008-1").unwrap().spacing_minutes, 1.0);
    }

    #[test]
    fn test_parse_invalid_model_names() {
        assert!(parse_model_name("egm96").is_none());
        assert!(parse_model_name("-5").is_none());
        assert!(parse_model_name("egm96-x").is_none());
        assert!(parse_model_name("egm96-0").is_none());
    }

    #[test]
    fn test_find_model_prefers_two_byte_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            find_model(dir.path(), "egm96-5"),
            Err(GeoidError::FileNotFound { path }) if path.ends_with("egm96-5.pgm")
        ));

        fs::write(dir.path().join("egm96-5.pgm4"), b"").unwrap();
        assert_eq!(
            find_model(dir.path(), "egm96-5").unwrap(),
            dir.path().join("egm96-5.pgm4")
        );

        fs::write(dir.path().join("egm96-5.pgm"), b"").unwrap();
        assert_eq!(
            find_model(dir.path(), "egm96-5").unwrap(),
            dir.path().join("egm96-5.pgm")
        );
    }
}
