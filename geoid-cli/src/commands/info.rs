use anyhow::{Context, Result};
use geoid::filename::{model_name_from_filename, parse_model_name};
use geoid::{Geoid, GeoidModel};
use std::path::PathBuf;

use super::{format_size, GeoidArgs};

pub fn run(args: &GeoidArgs, path: Option<PathBuf>) -> Result<()> {
    let geoid = match path {
        Some(path) => Geoid::open(&path, args.interpolation())
            .with_context(|| format!("Failed to open {}", path.display()))?,
        None => args.open()?,
    };

    let file_size = std::fs::metadata(geoid.path())
        .context("Failed to read file metadata")?
        .len();
    let header = geoid.info().header();

    println!("Model: {}", geoid.name());
    println!("Path: {}", geoid.path().display());
    println!("Description: {}", geoid.description());
    println!("Date: {}", geoid.datetime());
    println!();
    println!(
        "Grid: {}x{} ({}-byte samples)",
        geoid.grid_width(),
        geoid.grid_height(),
        header.format.size()
    );

    let spacing = model_name_from_filename(&geoid.path().to_string_lossy())
        .and_then(parse_model_name)
        .map(|parsed| parsed.spacing_minutes)
        .unwrap_or(360.0 * 60.0 / geoid.grid_width() as f64);
    println!("Spacing: {}'", spacing);
    println!("Offset: {} m", geoid.offset());
    println!("Scale: {} m", geoid.scale());
    println!("File size: {}", format_size(file_size));
    println!();

    println!("Interpolation: {}", geoid.interpolation());
    match geoid.max_error() {
        Some(max) => println!("Max error: {} m", max),
        None => println!("Max error: unknown"),
    }
    match geoid.rms_error() {
        Some(rms) => println!("RMS error: {} m", rms),
        None => println!("RMS error: unknown"),
    }

    if let Some(extent) = geoid.cache_extent() {
        println!();
        println!(
            "Cached area: {}..{} lat, {}..{} lon",
            extent.south, extent.north, extent.west, extent.east
        );
    }

    Ok(())
}
