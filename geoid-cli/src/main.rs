use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{CacheArea, GeoidArgs};

/// Geoid height queries and conversions
#[derive(Parser)]
#[command(name = "geoid-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing geoid model files
    #[arg(short = 'd', long, env = "GEOID_PATH", global = true)]
    geoid_dir: Option<PathBuf>,

    /// Geoid model name (e.g., egm96-5, egm2008-1)
    #[arg(short, long, env = "GEOID_NAME", global = true)]
    model: Option<String>,

    /// Use bilinear instead of cubic interpolation
    #[arg(short, long, global = true)]
    bilinear: bool,

    /// Cache the area SOUTH,WEST,NORTH,EAST in memory before querying
    #[arg(long, global = true, value_name = "S,W,N,E", allow_hyphen_values = true)]
    cache: Option<CacheArea>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the geoid height at a single coordinate
    Query {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Also report the northward and eastward gradients
        #[arg(short, long)]
        gradient: bool,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Convert a height between the ellipsoid and the geoid
    Convert {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Height in meters
        #[arg(long, allow_hyphen_values = true)]
        height: f64,

        /// Convert from geoid (orthometric) to ellipsoidal height instead
        #[arg(short, long)]
        reverse: bool,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Process geoid heights for multiple coordinates from a file
    Batch {
        /// Input file (CSV or GeoJSON)
        input: PathBuf,

        /// Output file (same format as input if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column name for latitude (CSV only)
        #[arg(long, default_value = "lat")]
        lat_col: String,

        /// Column name for longitude (CSV only)
        #[arg(long, default_value = "lon")]
        lon_col: String,

        /// Convert heights instead of adding geoid heights. For CSV, the
        /// column holding heights; for GeoJSON, the Z coordinate is used.
        #[arg(long)]
        convert: bool,

        /// Column name for heights to convert (CSV only)
        #[arg(long, default_value = "height")]
        height_col: String,

        /// With --convert, go from geoid to ellipsoidal heights
        #[arg(short, long)]
        reverse: bool,
    },

    /// Display information about a geoid model
    Info {
        /// Path to a .pgm/.pgm4 file; defaults to the selected model
        path: Option<PathBuf>,
    },

    /// List geoid models in the geoid directory
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let args = GeoidArgs {
        geoid_dir: cli.geoid_dir,
        model: cli.model,
        bilinear: cli.bilinear,
        cache: cli.cache,
    };

    match cli.command {
        Commands::Query {
            lat,
            lon,
            gradient,
            json,
        } => commands::query::run(&args, lat, lon, gradient, json),
        Commands::Convert {
            lat,
            lon,
            height,
            reverse,
            json,
        } => commands::convert::run(&args, lat, lon, height, reverse, json),
        Commands::Batch {
            input,
            output,
            lat_col,
            lon_col,
            convert,
            height_col,
            reverse,
        } => commands::batch::run(
            &args,
            input,
            output,
            lat_col,
            lon_col,
            convert.then_some(height_col),
            reverse,
        ),
        Commands::Info { path } => commands::info::run(&args, path),
        Commands::List => commands::list::run(&args),
    }
}
