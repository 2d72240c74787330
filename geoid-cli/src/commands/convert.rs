use anyhow::{Context, Result};
use geoid::{ConvertDirection, GeoidModel};
use serde::Serialize;

use super::GeoidArgs;

#[derive(Serialize)]
struct ConvertResponse {
    lat: f64,
    lon: f64,
    input_height: f64,
    output_height: f64,
    direction: &'static str,
}

pub fn run(
    args: &GeoidArgs,
    lat: f64,
    lon: f64,
    height: f64,
    reverse: bool,
    json: bool,
) -> Result<()> {
    let mut geoid = args.open()?;

    let (direction, label) = if reverse {
        (ConvertDirection::GeoidToEllipsoid, "geoid_to_ellipsoid")
    } else {
        (ConvertDirection::EllipsoidToGeoid, "ellipsoid_to_geoid")
    };

    let converted = geoid
        .convert_height(lat, lon, height, direction)
        .context("Failed to convert height")?;

    if json {
        let response = ConvertResponse {
            lat,
            lon,
            input_height: height,
            output_height: converted,
            direction: label,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        println!("{:.4}", converted);
    }

    Ok(())
}
