pub mod batch;
pub mod convert;
pub mod info;
pub mod list;
pub mod query;

use anyhow::{Context, Result};
use geoid::filename::{default_geoid_name, default_geoid_path};
use geoid::{BoundingBox, Geoid, GeoidModel, Interpolation};
use std::path::PathBuf;
use std::str::FromStr;

/// Options shared by every subcommand.
pub struct GeoidArgs {
    pub geoid_dir: Option<PathBuf>,
    pub model: Option<String>,
    pub bilinear: bool,
    pub cache: Option<CacheArea>,
}

impl GeoidArgs {
    pub fn directory(&self) -> PathBuf {
        self.geoid_dir.clone().unwrap_or_else(default_geoid_path)
    }

    pub fn model_name(&self) -> String {
        self.model.clone().unwrap_or_else(default_geoid_name)
    }

    pub fn interpolation(&self) -> Interpolation {
        if self.bilinear {
            Interpolation::Bilinear
        } else {
            Interpolation::Cubic
        }
    }

    /// Open the selected model and cache the requested area, if any.
    pub fn open(&self) -> Result<Geoid> {
        let name = self.model_name();
        let mut geoid = Geoid::builder(&name)
            .directory(self.directory())
            .interpolation(self.interpolation())
            .build()
            .with_context(|| format!("Failed to open geoid model '{}'", name))?;

        if let Some(CacheArea(area)) = &self.cache {
            geoid
                .cache_area(area.south, area.west, area.north, area.east)
                .context("Failed to cache area")?;
        }

        Ok(geoid)
    }
}

/// A `SOUTH,WEST,NORTH,EAST` rectangle given on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheArea(pub BoundingBox);

impl FromStr for CacheArea {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid number in area '{}': {}", s, e))?;

        match values.as_slice() {
            &[south, west, north, east] => Ok(CacheArea(BoundingBox::new(south, west, north, east))),
            _ => Err(format!(
                "expected SOUTH,WEST,NORTH,EAST but got {} values",
                values.len()
            )),
        }
    }
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
