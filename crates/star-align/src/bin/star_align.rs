//! star-align CLI — align two star fields given as JSON point lists.
//!
//! Each input file holds an array of `[x, y]` coordinate pairs. The fitted
//! transform and the resolved correspondences are printed as JSON.

use clap::Parser;
use nalgebra::Point2;
use std::path::PathBuf;

use star_align::{find_transform, AlignInput, AlignParams};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "star-align")]
#[command(about = "Recover the similarity transform between two star fields (JSON point lists)")]
#[command(version)]
struct Cli {
    /// Path to the source point list (JSON array of [x, y]).
    source: PathBuf,

    /// Path to the target point list (JSON array of [x, y]).
    target: PathBuf,

    /// Descriptor-space matching radius.
    #[arg(long, default_value = "0.1")]
    match_radius: f64,

    /// RANSAC inlier threshold in pixels.
    #[arg(long, default_value = "2.0")]
    pixel_tolerance: f64,

    /// Keep at most this many control points per set.
    #[arg(long, default_value = "50")]
    max_control_points: usize,

    /// RNG seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,

    /// Verbose logging to stderr.
    #[arg(short, long)]
    verbose: bool,
}

fn load_points(path: &PathBuf) -> CliResult<Vec<Point2<f64>>> {
    let text = std::fs::read_to_string(path)?;
    let raw: Vec<[f64; 2]> = serde_json::from_str(&text)?;
    Ok(raw.into_iter().map(|[x, y]| Point2::new(x, y)).collect())
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    star_align::init_with_level(level)?;

    let source = load_points(&cli.source)?;
    let target = load_points(&cli.target)?;

    let params = AlignParams {
        match_radius: cli.match_radius,
        pixel_tolerance: cli.pixel_tolerance,
        max_control_points: cli.max_control_points,
        seed: cli.seed,
        ..AlignParams::default()
    };

    let alignment = find_transform(
        AlignInput::Points(&source),
        AlignInput::Points(&target),
        &params,
    )?;

    println!("{}", serde_json::to_string_pretty(&alignment)?);
    Ok(())
}
