//! nimbus: derive diagnostic fields from gridded data.
//! Each subcommand reads GriddedField JSON and writes the derived field as
//! JSON, to a file or stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nimbus_core::{
    apply_night_mask, DayNightClassifier, GriddedField, TextureAnalyzer, TextureParams,
    VicinityFilter, VicinityParams,
};
use serde::de::DeserializeOwned;
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "nimbus", about = "Day/night, vicinity and texture diagnostics for gridded fields")]
struct Args {
    /// Write the result here instead of stdout.
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 1 where the sun is up, 0 where it is down, for each slice's time.
    DayNightMask {
        /// Field supplying the grid and time coordinates.
        input: PathBuf,
    },

    /// Zero a field wherever a day/night mask says night.
    ApplyNightMask {
        input: PathBuf,
        /// Output of `day-night-mask` on the same grid.
        mask: PathBuf,
    },

    /// Maximum value within a vicinity of each cell.
    Vicinity {
        input: PathBuf,

        /// Vicinity radius in metres.
        #[arg(long)]
        radius: Option<f64>,

        /// Vicinity radius in grid cells.
        #[arg(long)]
        grid_point_radius: Option<usize>,

        /// land_binary_mask field; values never spread between land and sea.
        #[arg(long)]
        land_mask: Option<PathBuf>,

        /// JSON VicinityParams; flags override its values.
        #[arg(long)]
        params: Option<PathBuf>,
    },

    /// Probability that a binary field is textured, over the ensemble.
    FieldTexture {
        input: PathBuf,

        /// Neighbourhood radius in metres.
        #[arg(long)]
        neighbourhood_radius: Option<f64>,

        /// Ratio above which a cell counts as textured.
        #[arg(long)]
        ratio_threshold: Option<f64>,

        /// JSON TextureParams; flags override its values.
        #[arg(long)]
        params: Option<PathBuf>,
    },
}

// ── I/O ───────────────────────────────────────────────────────────────────────

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn read_params<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(p) => read_json(p),
        None => Ok(T::default()),
    }
}

fn write_field(field: &GriddedField, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string(field).context("serialising output field")?;
    match output {
        Some(p) => fs::write(p, json).with_context(|| format!("writing {}", p.display())),
        None => {
            let mut out = io::stdout().lock();
            writeln!(out, "{json}").context("writing to stdout")
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn vicinity_params(
    params: Option<&Path>,
    radius: Option<f64>,
    grid_point_radius: Option<usize>,
) -> Result<VicinityParams> {
    let mut p: VicinityParams = read_params(params)?;
    if radius.is_some() {
        p.radius = radius;
    }
    if grid_point_radius.is_some() {
        p.grid_point_radius = grid_point_radius;
    }
    Ok(p)
}

fn texture_params(
    params: Option<&Path>,
    neighbourhood_radius: Option<f64>,
    ratio_threshold: Option<f64>,
) -> Result<TextureParams> {
    let mut p: TextureParams = read_params(params)?;
    if let Some(r) = neighbourhood_radius {
        p.neighbourhood_radius = r;
    }
    if let Some(t) = ratio_threshold {
        p.ratio_threshold = t;
    }
    Ok(p)
}

fn run(command: &Command) -> Result<GriddedField> {
    match command {
        Command::DayNightMask { input } => {
            let field: GriddedField = read_json(input)?;
            Ok(DayNightClassifier::new().process(&field)?)
        }
        Command::ApplyNightMask { input, mask } => {
            let field: GriddedField = read_json(input)?;
            let mask: GriddedField = read_json(mask)?;
            Ok(apply_night_mask(&field, &mask)?)
        }
        Command::Vicinity { input, radius, grid_point_radius, land_mask, params } => {
            let params = vicinity_params(params.as_deref(), *radius, *grid_point_radius)?;
            let land_mask = land_mask.as_deref().map(read_json::<GriddedField>).transpose()?;
            info!(?params, land_mask = land_mask.is_some(), "vicinity");
            let filter = VicinityFilter::new(params, land_mask)?;
            let field: GriddedField = read_json(input)?;
            Ok(filter.process(&field)?)
        }
        Command::FieldTexture { input, neighbourhood_radius, ratio_threshold, params } => {
            let params = texture_params(params.as_deref(), *neighbourhood_radius, *ratio_threshold)?;
            info!(?params, "field texture");
            let analyzer = TextureAnalyzer::new(params)?;
            let field: GriddedField = read_json(input)?;
            Ok(analyzer.process(&field)?)
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let field = run(&args.command)?;
    info!(name = %field.name, shape = ?field.shape(), "done");
    write_field(&field, args.output.as_deref())
}
