//! Geoid height service with LRU model caching.
//!
//! This module provides [`GeoidService`], a high-level interface for querying
//! geoid heights from a directory of models. Models are loaded on first use
//! as [`ThreadSafeGeoid`]s and kept in a bounded cache, so a single service
//! can be shared between threads.
//!
//! # Distribution Archives
//!
//! When `name.pgm` is missing but `name.zip` is present, the model file is
//! extracted from the archive into the data directory on first use.
//!
//! ```ignore
//! use geoid::GeoidServiceBuilder;
//!
//! let service = GeoidServiceBuilder::new("/data/geoids")
//!     .cache_size(2)
//!     .default_model("egm2008-1")
//!     .build();
//!
//! // Extracts egm2008-1.pgm from egm2008-1.zip if needed
//! let n = service.get_height(35.5, 138.5)?;
//! ```

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use moka::sync::Cache;
use tracing::{debug, warn};

use crate::error::{GeoidError, Result};
use crate::filename::{
    default_geoid_name, default_geoid_path, find_model, model_name_from_filename,
};
use crate::interpolate::{Interpolation, Undulation};
use crate::model::ConvertDirection;
use crate::resident::ThreadSafeGeoid;

/// Number of models kept loaded when not configured.
const DEFAULT_CACHE_SIZE: u64 = 4;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of models currently in the cache.
    pub entry_count: u64,
    /// Number of cache hits (requests served from cache).
    pub hit_count: u64,
    /// Number of cache misses (models loaded from disk).
    pub miss_count: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Statistics from a preload operation.
#[derive(Debug, Clone, Default)]
pub struct PreloadStats {
    /// Number of models successfully loaded into cache.
    pub models_loaded: u64,
    /// Number of models that were already in cache.
    pub models_already_cached: u64,
    /// Number of models that failed to load.
    pub models_failed: u64,
    /// Number of models that matched the name filter.
    pub models_matched: u64,
    /// Total elapsed time in milliseconds.
    pub elapsed_ms: u64,
}

/// High-level geoid height service with automatic model caching.
///
/// # Example
///
/// ```ignore
/// use geoid::GeoidService;
///
/// let service = GeoidService::new("/usr/local/share/GeographicLib/geoids", 4);
///
/// // Query the default model (egm96-5) - loaded automatically
/// let n = service.get_height(35.6762, 139.6503)?; // Tokyo
///
/// // Query another model by name
/// let n2008 = service.get_height_with_model("egm2008-1", 35.6762, 139.6503)?;
///
/// let stats = service.cache_stats();
/// println!("Cache hit rate: {:.1}%", stats.hit_rate() * 100.0);
/// ```
pub struct GeoidService {
    /// Directory containing model files.
    data_dir: PathBuf,
    /// Model used by queries that do not name one.
    default_model: String,
    interpolation: Interpolation,
    /// LRU cache of loaded models, keyed by model name.
    model_cache: Cache<String, Arc<ThreadSafeGeoid>>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl GeoidService {
    /// Create a service over `data_dir` keeping up to `cache_size` models
    /// loaded, using `$GEOID_NAME` (or `egm96-5`) as the default model.
    pub fn new<P: AsRef<Path>>(data_dir: P, cache_size: u64) -> Self {
        GeoidServiceBuilder::new(data_dir)
            .cache_size(cache_size)
            .build()
    }

    /// Create a builder for more configuration options.
    pub fn builder<P: AsRef<Path>>(data_dir: P) -> GeoidServiceBuilder {
        GeoidServiceBuilder::new(data_dir)
    }

    /// Geoid height of the default model.
    ///
    /// # Errors
    ///
    /// - [`GeoidError::OutOfBounds`] for invalid coordinates
    /// - [`GeoidError::FileNotFound`] if the model is not in the data
    ///   directory
    /// - any error loading the model
    pub fn get_height(&self, lat: f64, lon: f64) -> Result<f64> {
        self.get_height_with_model(&self.default_model, lat, lon)
    }

    /// Geoid height of model `name`.
    pub fn get_height_with_model(&self, name: &str, lat: f64, lon: f64) -> Result<f64> {
        self.model(name)?.height(lat, lon)
    }

    /// Geoid height and gradient of the default model.
    pub fn get_undulation(&self, lat: f64, lon: f64) -> Result<Undulation> {
        self.model(&self.default_model)?.undulation(lat, lon)
    }

    /// Convert a height between the ellipsoid and the default model.
    pub fn convert_height(
        &self,
        lat: f64,
        lon: f64,
        h: f64,
        direction: ConvertDirection,
    ) -> Result<f64> {
        self.model(&self.default_model)?
            .convert_height(lat, lon, h, direction)
    }

    /// Geoid heights of the default model for a batch of `(lat, lon)`
    /// coordinates.
    ///
    /// The model is loaded once for the whole batch. Uses `default` for
    /// invalid coordinates, or for every coordinate if the model cannot be
    /// loaded.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let coords = vec![(35.3606, 138.7274), (27.9881, 86.9250)];
    /// let heights = service.get_heights_batch(&coords, f64::NAN);
    /// ```
    pub fn get_heights_batch(&self, coords: &[(f64, f64)], default: f64) -> Vec<f64> {
        let model = match self.model(&self.default_model) {
            Ok(model) => model,
            Err(e) => {
                warn!(model = %self.default_model, error = %e, "Batch model unavailable");
                return vec![default; coords.len()];
            }
        };
        coords
            .iter()
            .map(|&(lat, lon)| model.height(lat, lon).unwrap_or(default))
            .collect()
    }

    /// Load model `name` from cache, disk, or its distribution archive.
    pub fn model(&self, name: &str) -> Result<Arc<ThreadSafeGeoid>> {
        if let Some(model) = self.model_cache.get(name) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(model);
        }
        self.miss_count.fetch_add(1, Ordering::Relaxed);

        let path = match find_model(&self.data_dir, name) {
            Ok(path) => path,
            Err(GeoidError::FileNotFound { path }) => {
                let zip_path = self.data_dir.join(format!("{name}.zip"));
                if !zip_path.is_file() {
                    return Err(GeoidError::FileNotFound { path });
                }
                self.extract_model_from_zip(&zip_path, name)?
            }
            Err(e) => return Err(e),
        };

        let model = Arc::new(ThreadSafeGeoid::open(&path, self.interpolation)?);
        self.model_cache.insert(name.to_string(), Arc::clone(&model));
        Ok(model)
    }

    /// Extract `name.pgm` or `name.pgm4` from a local archive into the data
    /// directory, returning the extracted path.
    fn extract_model_from_zip(&self, zip_path: &Path, name: &str) -> Result<PathBuf> {
        let archive_error = |message: String| GeoidError::Archive {
            path: zip_path.to_path_buf(),
            message,
        };
        let file = File::open(zip_path).map_err(|source| GeoidError::Io {
            path: zip_path.to_path_buf(),
            source,
        })?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| archive_error(e.to_string()))?;

        // Archives nest the model under a geoids/ directory
        let wanted = [format!("{name}.pgm"), format!("{name}.pgm4")];
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| archive_error(e.to_string()))?;
            let entry_name = entry.name().to_string();
            let Some(filename) = wanted.iter().find(|w| {
                entry_name == **w || entry_name.ends_with(&format!("/{w}"))
            }) else {
                continue;
            };

            let out_path = self.data_dir.join(filename);
            let part_path = self.data_dir.join(format!("{filename}.part"));
            let io_error = |source: io::Error| GeoidError::Io {
                path: out_path.clone(),
                source,
            };
            let mut out_file = File::create(&part_path).map_err(io_error)?;
            io::copy(&mut entry, &mut out_file).map_err(io_error)?;
            fs::rename(&part_path, &out_path).map_err(io_error)?;

            debug!(
                archive = %zip_path.display(),
                path = %out_path.display(),
                "Extracted geoid model"
            );
            return Ok(out_path);
        }

        Err(archive_error(format!("no {name}.pgm entry in archive")))
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.model_cache.entry_count(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Name of the model used when none is given.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Get the maximum cache size.
    pub fn cache_capacity(&self) -> u64 {
        self.model_cache.policy().max_capacity().unwrap_or(0)
    }

    /// Remove model `name` from the cache, e.g. after its file was replaced.
    pub fn invalidate_model(&self, name: &str) {
        self.model_cache.invalidate(name);
    }

    /// Clear all models from the cache.
    pub fn clear_cache(&self) {
        self.model_cache.invalidate_all();
    }

    /// Scan the data directory for `.pgm`, `.pgm4` and `.zip` models.
    ///
    /// Returns a sorted, deduplicated list of model names (e.g.
    /// `["egm2008-1", "egm96-5"]`).
    pub fn scan_models(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut names = HashSet::new();
        for entry in entries.flatten() {
            let filename = entry.file_name();
            let filename = filename.to_string_lossy();
            let name = model_name_from_filename(&filename)
                .or_else(|| filename.strip_suffix(".zip"))
                .filter(|name| !name.is_empty());
            if let Some(name) = name {
                names.insert(name.to_string());
            }
        }

        let mut result: Vec<String> = names.into_iter().collect();
        result.sort();
        result
    }

    /// Preload models into the cache.
    ///
    /// Loads every model found by [`scan_models`](Self::scan_models), or
    /// only those listed in `names`. Useful for warming the cache at startup.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let stats = service.preload(Some(&["egm96-5", "egm2008-1"]));
    /// println!("Loaded {} models in {}ms", stats.models_loaded, stats.elapsed_ms);
    /// ```
    pub fn preload(&self, names: Option<&[&str]>) -> PreloadStats {
        let start = Instant::now();
        let mut stats = PreloadStats::default();

        for name in self.scan_models() {
            if let Some(names) = names {
                if !names.contains(&name.as_str()) {
                    continue;
                }
            }
            stats.models_matched += 1;

            if self.model_cache.contains_key(&name) {
                stats.models_already_cached += 1;
                continue;
            }

            match self.model(&name) {
                Ok(_) => stats.models_loaded += 1,
                Err(e) => {
                    warn!(model = %name, error = %e, "Failed to preload geoid model");
                    stats.models_failed += 1;
                }
            }
        }

        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        stats
    }
}

/// Builder for creating [`GeoidService`] with custom configuration.
///
/// # Example
///
/// ```ignore
/// use geoid::{GeoidServiceBuilder, Interpolation};
///
/// let service = GeoidServiceBuilder::new("/data/geoids")
///     .cache_size(2)
///     .interpolation(Interpolation::Bilinear)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct GeoidServiceBuilder {
    data_dir: PathBuf,
    cache_size: u64,
    default_model: String,
    interpolation: Interpolation,
}

impl GeoidServiceBuilder {
    /// Create a new builder with the specified data directory.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            cache_size: DEFAULT_CACHE_SIZE,
            default_model: default_geoid_name(),
            interpolation: Interpolation::default(),
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `GEOID_PATH` | Directory containing model files | `$GEOGRAPHICLIB_DATA/geoids` |
    /// | `GEOGRAPHICLIB_DATA` | GeographicLib data root | `/usr/local/share/GeographicLib` |
    /// | `GEOID_NAME` | Default model | `egm96-5` |
    /// | `GEOID_CACHE_SIZE` | Maximum models in cache | 4 |
    ///
    /// ```ignore
    /// use geoid::GeoidServiceBuilder;
    ///
    /// let service = GeoidServiceBuilder::from_env().build();
    /// ```
    pub fn from_env() -> Self {
        let cache_size = std::env::var("GEOID_CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_SIZE);
        Self::new(default_geoid_path()).cache_size(cache_size)
    }

    /// Set the data directory.
    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the maximum number of models to keep in cache.
    ///
    /// Default is 4 models.
    pub fn cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    /// Set the model used by queries that do not name one.
    pub fn default_model(mut self, name: impl Into<String>) -> Self {
        self.default_model = name.into();
        self
    }

    /// Set the interpolation used by every loaded model.
    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Build the [`GeoidService`].
    pub fn build(self) -> GeoidService {
        GeoidService {
            data_dir: self.data_dir,
            default_model: self.default_model,
            interpolation: self.interpolation,
            model_cache: Cache::builder().max_capacity(self.cache_size).build(),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_smooth_geoid, write_toy_geoid};
    use std::io::Write;
    use tempfile::TempDir;

    fn toy_service(dir: &Path) -> GeoidService {
        write_toy_geoid(dir);
        GeoidService::builder(dir)
            .default_model("toy")
            .interpolation(Interpolation::Bilinear)
            .cache_size(10)
            .build()
    }

    fn zip_model(dir: &Path, name: &str) {
        let pgm = write_toy_geoid(dir);
        let data = fs::read(&pgm).unwrap();
        fs::remove_file(&pgm).unwrap();

        let file = File::create(dir.join(format!("{name}.zip"))).unwrap();
        let mut zip_writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        zip_writer
            .start_file(format!("geoids/{name}.pgm"), options)
            .unwrap();
        zip_writer.write_all(&data).unwrap();
        zip_writer.finish().unwrap();
    }

    #[test]
    fn test_service_basic() {
        let temp_dir = TempDir::new().unwrap();
        let service = toy_service(temp_dir.path());

        assert_eq!(service.get_height(45.0, 45.0).unwrap(), 5.5);
        assert_eq!(service.get_undulation(0.0, 90.0).unwrap().height, 11.0);
        assert_eq!(
            service
                .convert_height(45.0, 45.0, 10.0, ConvertDirection::EllipsoidToGeoid)
                .unwrap(),
            4.5
        );
    }

    #[test]
    fn test_cache_hit() {
        let temp_dir = TempDir::new().unwrap();
        let service = toy_service(temp_dir.path());

        // First query - cache miss
        service.get_height(10.0, 10.0).unwrap();
        let stats1 = service.cache_stats();
        assert_eq!(stats1.miss_count, 1);
        assert_eq!(stats1.hit_count, 0);

        // Second query - cache hit
        service.get_height(20.0, 20.0).unwrap();
        let stats2 = service.cache_stats();
        assert_eq!(stats2.miss_count, 1);
        assert_eq!(stats2.hit_count, 1);
        assert_eq!(stats2.hit_rate(), 0.5);
    }

    #[test]
    fn test_multiple_models() {
        let temp_dir = TempDir::new().unwrap();
        let service = toy_service(temp_dir.path());
        write_smooth_geoid(temp_dir.path());

        let toy = service.get_height_with_model("toy", 0.0, 90.0).unwrap();
        let smooth = service.get_height_with_model("smooth", 0.0, 90.0).unwrap();
        assert_eq!(toy, 11.0);
        assert_ne!(toy, smooth);
        assert_eq!(service.cache_stats().miss_count, 2);
    }

    #[test]
    fn test_invalid_coordinates() {
        let temp_dir = TempDir::new().unwrap();
        let service = toy_service(temp_dir.path());
        assert!(matches!(
            service.get_height(95.0, 0.0),
            Err(GeoidError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_missing_model() {
        let temp_dir = TempDir::new().unwrap();
        let service = GeoidService::builder(temp_dir.path())
            .default_model("egm96-5")
            .build();
        assert!(matches!(
            service.get_height(0.0, 0.0),
            Err(GeoidError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_get_heights_batch() {
        let temp_dir = TempDir::new().unwrap();
        let service = toy_service(temp_dir.path());

        let coords = vec![(45.0, 45.0), (91.0, 0.0), (0.0, 90.0)];
        let results = service.get_heights_batch(&coords, -999.0);
        assert_eq!(results, vec![5.5, -999.0, 11.0]);

        let missing = GeoidService::builder(temp_dir.path())
            .default_model("absent")
            .build();
        assert_eq!(missing.get_heights_batch(&coords, -1.0), vec![-1.0; 3]);
    }

    #[test]
    fn test_zip_extraction() {
        let temp_dir = TempDir::new().unwrap();
        zip_model(temp_dir.path(), "toy");

        let service = GeoidService::builder(temp_dir.path())
            .default_model("toy")
            .interpolation(Interpolation::Bilinear)
            .build();
        assert_eq!(service.get_height(0.0, 90.0).unwrap(), 11.0);

        // Extracted model file should now exist
        assert!(temp_dir.path().join("toy.pgm").exists());
        assert!(!temp_dir.path().join("toy.pgm.part").exists());
    }

    #[test]
    fn test_zip_without_model() {
        let temp_dir = TempDir::new().unwrap();
        let file = File::create(temp_dir.path().join("egm84-30.zip")).unwrap();
        let mut zip_writer = zip::ZipWriter::new(file);
        zip_writer
            .start_file(
                "README",
                zip::write::SimpleFileOptions::default()
                    .compression_method(zip::CompressionMethod::Stored),
            )
            .unwrap();
        zip_writer.write_all(b"nothing here").unwrap();
        zip_writer.finish().unwrap();

        let service = GeoidService::new(temp_dir.path(), 2);
        assert!(matches!(
            service.get_height_with_model("egm84-30", 0.0, 0.0),
            Err(GeoidError::Archive { .. })
        ));
    }

    #[test]
    fn test_clear_and_invalidate() {
        let temp_dir = TempDir::new().unwrap();
        let service = toy_service(temp_dir.path());

        service.get_height(0.0, 0.0).unwrap();
        service.invalidate_model("toy");
        service.get_height(0.0, 0.0).unwrap();
        assert_eq!(service.cache_stats().miss_count, 2);

        service.clear_cache();
        service.get_height(0.0, 0.0).unwrap();
        assert_eq!(service.cache_stats().miss_count, 3);
    }

    #[test]
    fn test_cache_capacity() {
        let temp_dir = TempDir::new().unwrap();
        let service = GeoidService::new(temp_dir.path(), 3);
        assert_eq!(service.cache_capacity(), 3);
        assert_eq!(GeoidService::builder(temp_dir.path()).build().cache_capacity(), 4);
    }

    #[test]
    fn test_scan_models_deduplicates_zip() {
        let temp_dir = TempDir::new().unwrap();
        write_toy_geoid(temp_dir.path());
        write_smooth_geoid(temp_dir.path());
        fs::write(temp_dir.path().join("toy.zip"), b"").unwrap();
        fs::write(temp_dir.path().join("egm2008-1.zip"), b"").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"").unwrap();

        let service = GeoidService::new(temp_dir.path(), 2);
        assert_eq!(service.scan_models(), vec!["egm2008-1", "smooth", "toy"]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let service = GeoidService::new("/nonexistent/geoids", 2);
        assert!(service.scan_models().is_empty());
    }

    #[test]
    fn test_preload() {
        let temp_dir = TempDir::new().unwrap();
        write_toy_geoid(temp_dir.path());
        write_smooth_geoid(temp_dir.path());
        // Unreadable archive
        fs::write(temp_dir.path().join("broken.zip"), b"not a zip").unwrap();

        let service = GeoidService::new(temp_dir.path(), 10);
        let stats = service.preload(None);
        assert_eq!(stats.models_matched, 3);
        assert_eq!(stats.models_loaded, 2);
        assert_eq!(stats.models_failed, 1);

        let stats = service.preload(Some(&["toy"]));
        assert_eq!(stats.models_matched, 1);
        assert_eq!(stats.models_already_cached, 1);
        assert_eq!(stats.models_loaded, 0);
    }

    #[test]
    fn test_from_env_with_values() {
        let temp_dir = TempDir::new().unwrap();
        let saved: Vec<_> = ["GEOID_PATH", "GEOID_NAME", "GEOID_CACHE_SIZE"]
            .iter()
            .map(|key| (*key, std::env::var_os(key)))
            .collect();

        std::env::set_var("GEOID_PATH", temp_dir.path());
        std::env::set_var("GEOID_NAME", "egm2008-2_5");
        std::env::set_var("GEOID_CACHE_SIZE", "7");

        let service = GeoidServiceBuilder::from_env().build();
        assert_eq!(service.data_dir(), temp_dir.path());
        assert_eq!(service.default_model(), "egm2008-2_5");
        assert_eq!(service.cache_capacity(), 7);

        for (key, value) in saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}
