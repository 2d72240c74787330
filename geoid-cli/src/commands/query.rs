use anyhow::{Context, Result};
use geoid::GeoidModel;
use serde::Serialize;

use super::GeoidArgs;

#[derive(Serialize)]
struct HeightResponse {
    lat: f64,
    lon: f64,
    geoid_height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    grad_north: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grad_east: Option<f64>,
    model: String,
    interpolation: &'static str,
}

pub fn run(args: &GeoidArgs, lat: f64, lon: f64, gradient: bool, json: bool) -> Result<()> {
    let mut geoid = args.open()?;

    let response = if gradient {
        let u = geoid
            .undulation(lat, lon)
            .context("Failed to get geoid height")?;
        HeightResponse {
            lat,
            lon,
            geoid_height: u.height,
            grad_north: Some(u.grad_north),
            grad_east: Some(u.grad_east),
            model: geoid.name().to_string(),
            interpolation: geoid.interpolation().name(),
        }
    } else {
        let height = geoid
            .height(lat, lon)
            .context("Failed to get geoid height")?;
        HeightResponse {
            lat,
            lon,
            geoid_height: height,
            grad_north: None,
            grad_east: None,
            model: geoid.name().to_string(),
            interpolation: geoid.interpolation().name(),
        }
    };

    if json {
        println!("{}", serde_json::to_string(&response)?);
    } else {
        print!("{:.4}", response.geoid_height);
        if let (Some(north), Some(east)) = (response.grad_north, response.grad_east) {
            print!(" {:.6e} {:.6e}", north, east);
        }
        println!();
    }

    Ok(())
}
