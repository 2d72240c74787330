use anyhow::{bail, Context, Result};
use geoid::geojson::{add_heights_to_geometry, convert_geometry_heights};
use geoid::{ConvertDirection, Geoid, GeoidModel};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::GeoidArgs;

pub fn run(
    args: &GeoidArgs,
    input: PathBuf,
    output: Option<PathBuf>,
    lat_col: String,
    lon_col: String,
    height_col: Option<String>,
    reverse: bool,
) -> Result<()> {
    let mut geoid = args.open()?;

    let direction = if reverse {
        ConvertDirection::GeoidToEllipsoid
    } else {
        ConvertDirection::EllipsoidToGeoid
    };

    // Detect file format
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "csv" => process_csv(
            &mut geoid,
            &input,
            output,
            &lat_col,
            &lon_col,
            height_col.as_deref().map(|col| (col, direction)),
        ),
        "geojson" | "json" => {
            let direction = height_col.is_some().then_some(direction);
            process_geojson(&mut geoid, &input, output, direction)
        }
        _ => bail!(
            "Unsupported file format: {}. Use .csv or .geojson",
            extension
        ),
    }
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn default_output(input: &Path, suffix: &str, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}_{}.{}", stem, suffix, extension))
}

fn column(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .with_context(|| format!("Column '{}' not found in CSV", name))
}

fn field(record: &csv::StringRecord, index: usize, what: &str) -> Result<f64> {
    record
        .get(index)
        .with_context(|| format!("Missing {}", what))?
        .trim()
        .parse()
        .with_context(|| format!("Invalid {}", what))
}

/// Append a column with the geoid height, or with the converted height when
/// `convert` names the column holding input heights. Rows whose lookup
/// fails get `nan`.
fn process_csv(
    geoid: &mut Geoid,
    input: &Path,
    output: Option<PathBuf>,
    lat_col: &str,
    lon_col: &str,
    convert: Option<(&str, ConvertDirection)>,
) -> Result<()> {
    let file = File::open(input).context("Failed to open input file")?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let lat_idx = column(&headers, lat_col)?;
    let lon_idx = column(&headers, lon_col)?;
    let convert = match convert {
        Some((col, direction)) => Some((column(&headers, col)?, direction)),
        None => None,
    };

    // Collect records for progress bar
    let records: Vec<_> = reader.records().collect::<Result<_, _>>()?;
    let pb = progress_bar(records.len() as u64)?;

    let (suffix, new_column) = match convert {
        Some((_, ConvertDirection::GeoidToEllipsoid)) => ("ellipsoidal", "ellipsoidal_height"),
        Some(_) => ("orthometric", "orthometric_height"),
        None => ("geoid", "geoid_height"),
    };
    let output_path = output.unwrap_or_else(|| default_output(input, suffix, "csv"));
    let output_file = File::create(&output_path).context("Failed to create output file")?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(output_file));

    let mut new_headers: Vec<&str> = headers.iter().collect();
    new_headers.push(new_column);
    writer.write_record(&new_headers)?;

    let mut failed = 0u64;
    for record in &records {
        let lat = field(record, lat_idx, "latitude")?;
        let lon = field(record, lon_idx, "longitude")?;

        let value = match convert {
            Some((height_idx, direction)) => {
                let h = field(record, height_idx, "height")?;
                geoid.convert_height(lat, lon, h, direction)
            }
            None => geoid.height(lat, lon),
        };

        let value = match value {
            Ok(v) => format!("{:.4}", v),
            Err(e) => {
                debug!(lat, lon, error = %e, "Geoid lookup failed");
                failed += 1;
                "nan".to_string()
            }
        };

        let mut new_record: Vec<&str> = record.iter().collect();
        new_record.push(&value);
        writer.write_record(&new_record)?;

        pb.inc(1);
    }

    pb.finish_with_message("done");
    writer.flush()?;

    if failed > 0 {
        eprintln!("{} of {} rows could not be computed", failed, records.len());
    }
    println!("Output written to: {}", output_path.display());
    Ok(())
}

fn process_geojson(
    geoid: &mut Geoid,
    input: &Path,
    output: Option<PathBuf>,
    direction: Option<ConvertDirection>,
) -> Result<()> {
    let file = File::open(input).context("Failed to open input file")?;
    let reader = BufReader::new(file);

    let geojson: geojson::GeoJson =
        serde_json::from_reader(reader).context("Failed to parse GeoJSON")?;

    let mut apply = |geometry: geojson::Geometry| -> Result<geojson::Geometry> {
        let result = match direction {
            Some(direction) => convert_geometry_heights(geoid, geometry, direction),
            None => add_heights_to_geometry(geoid, geometry),
        };
        result.context("Failed to process geometry")
    };

    let result = match geojson {
        geojson::GeoJson::Geometry(geometry) => geojson::GeoJson::Geometry(apply(geometry)?),
        geojson::GeoJson::Feature(mut feature) => {
            if let Some(geometry) = feature.geometry.take() {
                feature.geometry = Some(apply(geometry)?);
            }
            geojson::GeoJson::Feature(feature)
        }
        geojson::GeoJson::FeatureCollection(mut fc) => {
            let pb = progress_bar(fc.features.len() as u64)?;
            for feature in &mut fc.features {
                if let Some(geometry) = feature.geometry.take() {
                    feature.geometry = Some(apply(geometry)?);
                }
                pb.inc(1);
            }
            pb.finish_with_message("done");
            geojson::GeoJson::FeatureCollection(fc)
        }
    };

    let suffix = match direction {
        Some(ConvertDirection::GeoidToEllipsoid) => "ellipsoidal",
        Some(_) => "orthometric",
        None => "geoid",
    };
    let output_path = output.unwrap_or_else(|| default_output(input, suffix, "geojson"));
    let output_file = File::create(&output_path).context("Failed to create output file")?;
    let mut writer = BufWriter::new(output_file);
    serde_json::to_writer_pretty(&mut writer, &result)?;
    writer.flush()?;

    println!("Output written to: {}", output_path.display());
    Ok(())
}
