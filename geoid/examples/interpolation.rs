//! Example comparing bilinear and cubic interpolation, with and without an
//! area cache.
//!
//! Run with: cargo run --example interpolation -- /path/to/geoids [model]

use geoid::{Geoid, GeoidError, GeoidModel, Interpolation};
use std::env;

fn main() -> Result<(), GeoidError> {
    let mut args = env::args().skip(1);
    let data_dir = args.next().unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example interpolation -- /path/to/geoids [model]");
        std::process::exit(1);
    });
    let model = args.next().unwrap_or_else(|| "egm96-5".to_string());

    let lat = 35.3606;
    let lon = 138.7274;

    println!("Comparing interpolation methods at ({}, {}):", lat, lon);
    println!("{:-<50}", "");

    for interpolation in [Interpolation::Bilinear, Interpolation::Cubic] {
        let mut geoid = Geoid::builder(&model)
            .directory(&data_dir)
            .interpolation(interpolation)
            .build()?;

        let u = geoid.undulation(lat, lon)?;
        println!(
            "{:<9} {:.4}m  grad N {:+.3e}  grad E {:+.3e}",
            interpolation, u.height, u.grad_north, u.grad_east
        );
        if let Some(max) = geoid.max_error() {
            println!("          max error {}m", max);
        }

        // Answers are identical once the area is cached
        geoid.cache_area(lat - 1.0, lon - 1.0, lat + 1.0, lon + 1.0)?;
        assert_eq!(geoid.height(lat, lon)?, u.height);
    }

    Ok(())
}
