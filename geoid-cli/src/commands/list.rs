use anyhow::Result;
use geoid::filename::{find_model, parse_model_name, KNOWN_MODELS};
use geoid::{Geoid, GeoidModel, GeoidService, GeoidServiceBuilder};
use std::fs;

use super::{format_size, GeoidArgs};

pub fn run(args: &GeoidArgs) -> Result<()> {
    let dir = args.directory();

    if !dir.exists() {
        anyhow::bail!("Geoid directory does not exist: {}", dir.display());
    }

    let service: GeoidService = GeoidServiceBuilder::new(&dir)
        .interpolation(args.interpolation())
        .build();
    let models = service.scan_models();

    if models.is_empty() {
        println!("No geoid models found in: {}", dir.display());
    } else {
        println!("{:<14} {:>9} {:>12}  DESCRIPTION", "MODEL", "SPACING", "SIZE");
        println!("{}", "-".repeat(60));

        let mut total_size: u64 = 0;
        for name in &models {
            let spacing = parse_model_name(name)
                .map(|parsed| format!("{}'", parsed.spacing_minutes))
                .unwrap_or_else(|| "?".to_string());

            // Models that are only present inside a zip archive have no
            // file to describe yet.
            let (size, description) = match find_model(&dir, name) {
                Ok(path) => {
                    let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                    total_size += size;
                    let description = match Geoid::open(&path, service.interpolation()) {
                        Ok(geoid) => geoid.description().to_string(),
                        Err(e) => format!("<{}>", e),
                    };
                    (format_size(size), description)
                }
                Err(_) => ("zip".to_string(), String::new()),
            };

            println!("{:<14} {:>9} {:>12}  {}", name, spacing, size, description);
        }

        println!();
        println!("Summary:");
        println!("  Total models: {}", models.len());
        println!("  Total size: {}", format_size(total_size));
    }

    let missing: Vec<&str> = KNOWN_MODELS
        .iter()
        .copied()
        .filter(|known| !models.iter().any(|m| m == known))
        .collect();
    if !missing.is_empty() {
        println!("  Not installed: {}", missing.join(", "));
    }
    println!("  Geoid directory: {}", dir.display());

    Ok(())
}
