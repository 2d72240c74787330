//! Basic example demonstrating geoid library usage.
//!
//! Run with: cargo run --example basic -- /path/to/geoids

use geoid::{ConvertDirection, GeoidError, GeoidService};
use std::env;

fn main() -> Result<(), GeoidError> {
    // Get geoid directory from command line
    let data_dir = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example basic -- /path/to/geoids");
        std::process::exit(1);
    });

    // Keep up to 2 models loaded
    let service = GeoidService::new(&data_dir, 2);
    println!("Models found: {:?}", service.scan_models());

    let locations = [
        ("Mount Fuji, Japan", 35.3606, 138.7274),
        ("Timbuktu, Mali", 16.776, -3.009),
        ("Denali, Alaska", 63.0695, -151.0074),
    ];

    println!("\nGeoid heights ({}):", service.default_model());
    println!("{:-<50}", "");

    for (name, lat, lon) in &locations {
        match service.get_height(*lat, *lon) {
            Ok(n) => {
                println!("{}: {:.3}m", name, n);
            }
            Err(GeoidError::FileNotFound { path }) => {
                println!("{}: model not available ({})", name, path.display());
            }
            Err(e) => {
                println!("{}: error - {}", name, e);
            }
        }
    }

    // A GPS height of 300m above the ellipsoid at Timbuktu
    if let Ok(h) = service.convert_height(16.776, -3.009, 300.0, ConvertDirection::EllipsoidToGeoid)
    {
        println!("\n300m ellipsoidal at Timbuktu is {:.3}m above the geoid", h);
    }

    // Show cache statistics
    let stats = service.cache_stats();
    println!("\nCache statistics:");
    println!("  Cached models: {}", stats.entry_count);
    println!("  Hits: {}", stats.hit_count);
    println!("  Misses: {}", stats.miss_count);
    println!("  Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    Ok(())
}
