//! twi CLI - Topographic Wetness Index from a DEM

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use twi_algorithms::hydrology::{FlowRouter, PriorityFlood, PriorityFloodParams};
use twi_algorithms::terrain::{Slope, SlopeMethod, SlopeParams};
use twi_algorithms::{Pipeline, PipelineConfig};
use twi_core::io::{read_geotiff, write_geotiff};
use twi_core::{Algorithm, Raster, D8};

const FILLED_NAME: &str = "DEM_FILLED.tif";
const SLOPE_NAME: &str = "SLOPE.tif";
const FLOW_ACC_NAME: &str = "FLOW_ACC.tif";
const TWI_NAME: &str = "TWI_RESULT.tif";

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "twi")]
#[command(author, version, about = "Topographic Wetness Index from a DEM", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Fill depressions with Priority-Flood
    Fill {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Elevation increment added across filled flats
        #[arg(long, default_value = "1e-6")]
        fill_increment: f64,
    },
    /// Calculate slope in radians (run on a filled DEM)
    Slope {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Gradient method
        #[arg(short, long, value_enum, default_value = "steepest")]
        method: SlopeArg,
        /// Lower clamp for slope values
        #[arg(long, default_value = "0.001")]
        min_slope: f64,
    },
    /// Fill, route with D8 and write the flow accumulation
    FlowAcc {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
    },
    /// Run the full pipeline and write every intermediate grid
    Run {
        /// Input DEM file
        input: PathBuf,
        /// Output directory
        out_dir: PathBuf,
        /// JSON file with pipeline configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the fill increment
        #[arg(long)]
        fill_increment: Option<f64>,
        /// Override the slope/catchment safety epsilon
        #[arg(long)]
        epsilon: Option<f64>,
        /// Override the tie-break order, e.g. E,SE,S,SW,W,NW,N,NE
        #[arg(long, value_delimiter = ',')]
        tie_break: Option<Vec<D8>>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SlopeArg {
    Steepest,
    Horn,
}

impl From<SlopeArg> for SlopeMethod {
    fn from(arg: SlopeArg) -> Self {
        match arg {
            SlopeArg::Steepest => SlopeMethod::SteepestDescent,
            SlopeArg::Horn => SlopeMethod::Horn,
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_dem(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_result(raster: &Raster<f64>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path)
        .with_context(|| format!("Failed to write output {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn write_statistics(out: &mut impl Write, name: &str, raster: &Raster<f64>) -> std::io::Result<()> {
    let stats = raster.statistics();
    writeln!(out, "{}:", name)?;
    if let (Some(min), Some(max)) = (stats.min, stats.max) {
        writeln!(out, "  Range: {:.4} .. {:.4}", min, max)?;
    }
    if let (Some(mean), Some(std_dev)) = (stats.mean, stats.std_dev) {
        writeln!(out, "  Mean: {:.4} (std {:.4})", mean, std_dev)?;
    }
    writeln!(
        out,
        "  Valid cells: {} ({} nodata)",
        stats.valid_count, stats.nodata_count
    )
}

fn load_config(
    path: Option<&Path>,
    fill_increment: Option<f64>,
    epsilon: Option<f64>,
    tie_break: Option<&[D8]>,
) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(delta) = fill_increment {
        config.fill_increment = delta;
    }
    if let Some(eps) = epsilon {
        config.epsilon = eps;
    }
    if let Some(order) = tie_break {
        config.tie_break = order
            .try_into()
            .context("tie-break needs exactly 8 directions")?;
    }
    debug!(?config, "pipeline configuration");
    Ok(config)
}

/// Run stage by stage, writing each grid as soon as it exists and
/// reporting statistics to `out`.
fn run_pipeline(
    dem: &Raster<f64>,
    out_dir: &Path,
    config: PipelineConfig,
    out: &mut impl Write,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let pipeline = Pipeline::new(config);
    let context = "TWI pipeline aborted";

    pipeline.validate(dem).context(context)?;
    write_statistics(out, "DEM", dem)?;

    let filled = pipeline.fill(dem).context(context)?;
    write_result(&filled, &out_dir.join(FILLED_NAME))?;
    write_statistics(out, "Filled DEM", &filled)?;

    let slope = pipeline.slope(&filled).context(context)?;
    write_result(&slope, &out_dir.join(SLOPE_NAME))?;
    write_statistics(out, "Slope (rad)", &slope)?;

    let routing = pipeline.route(&filled).context(context)?;
    write_result(&routing.accumulation, &out_dir.join(FLOW_ACC_NAME))?;
    write_statistics(out, "Flow accumulation", &routing.accumulation)?;

    let twi = pipeline
        .compose(&routing.accumulation, &slope)
        .context(context)?;
    write_result(&twi, &out_dir.join(TWI_NAME))?;
    write_statistics(out, "TWI", &twi)?;

    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Info { input } => {
            let raster = read_dem(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(epsg) = raster.geokeys().and_then(|keys| keys.epsg()) {
                println!("CRS: EPSG:{}", epsg);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!();
            write_statistics(&mut std::io::stdout().lock(), "Statistics", &raster)?;
        }

        Commands::Fill {
            input,
            output,
            fill_increment,
        } => {
            let dem = read_dem(&input)?;
            let start = Instant::now();
            let filled = PriorityFlood
                .execute(
                    dem,
                    PriorityFloodParams {
                        epsilon: fill_increment,
                    },
                )
                .context("Depression filling failed")?;
            let elapsed = start.elapsed();
            write_result(&filled, &output)?;
            done("Filled DEM", &output, elapsed);
        }

        Commands::Slope {
            input,
            output,
            method,
            min_slope,
        } => {
            let dem = read_dem(&input)?;
            let start = Instant::now();
            let result = Slope
                .execute(
                    dem,
                    SlopeParams {
                        method: method.into(),
                        min_slope,
                    },
                )
                .context("Slope calculation failed")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("Slope", &output, elapsed);
        }

        Commands::FlowAcc { input, output } => {
            let dem = read_dem(&input)?;
            let pipeline = Pipeline::default();
            let start = Instant::now();
            pipeline.validate(&dem)?;
            let filled = pipeline.fill(&dem)?;
            let routing = FlowRouter
                .execute_default(filled)
                .context("Flow routing failed")?;
            let elapsed = start.elapsed();
            write_result(&routing.accumulation, &output)?;
            done("Flow accumulation", &output, elapsed);
        }

        Commands::Run {
            input,
            out_dir,
            config,
            fill_increment,
            epsilon,
            tie_break,
        } => {
            let config = load_config(
                config.as_deref(),
                fill_increment,
                epsilon,
                tie_break.as_deref(),
            )?;
            let dem = read_dem(&input)?;
            let start = Instant::now();
            run_pipeline(&dem, &out_dir, config, &mut std::io::stdout().lock())?;
            done("TWI outputs", &out_dir, start.elapsed());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tie_break_arg(args: &[&str]) -> Option<Vec<D8>> {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Run { tie_break, .. } => tie_break,
            _ => panic!("expected the run subcommand"),
        }
    }

    #[test]
    fn test_tie_break_split_by_clap() {
        let order = tie_break_arg(&["twi", "run", "dem.tif", "out", "--tie-break", "N,ne,E,SE,S,SW,W,NW"])
            .unwrap();
        let config = load_config(None, None, None, Some(order.as_slice())).unwrap();
        assert_eq!(config.tie_break[0], D8::N);
        assert_eq!(config.tie_break[1], D8::NE);
        assert_eq!(config.tie_break[7], D8::NW);
    }

    #[test]
    fn test_tie_break_absent_keeps_default() {
        assert!(tie_break_arg(&["twi", "run", "dem.tif", "out"]).is_none());
        let config = load_config(None, None, None, None).unwrap();
        assert_eq!(config.tie_break, D8::DEFAULT_PRIORITY);
    }

    #[test]
    fn test_tie_break_rejects_unknown_direction() {
        let parsed = Cli::try_parse_from(["twi", "run", "dem.tif", "out", "--tie-break", "E,UP"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_tie_break_needs_eight_directions() {
        assert!(load_config(None, None, None, Some(&[D8::E, D8::N][..])).is_err());
    }

    #[test]
    fn test_run_reports_input_dem_before_outputs() {
        let mut dem: Raster<f64> = Raster::filled(5, 5, 10.0);
        dem.set(2, 2, 4.0).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let mut report = Vec::new();
        run_pipeline(&dem, dir.path(), PipelineConfig::default(), &mut report).unwrap();
        let report = String::from_utf8(report).unwrap();

        assert!(report.starts_with("DEM:\n  Range: 4.0000 .. 10.0000\n"));
        let sections: Vec<&str> = report.lines().filter(|l| l.ends_with(':')).collect();
        assert_eq!(
            sections,
            ["DEM:", "Filled DEM:", "Slope (rad):", "Flow accumulation:", "TWI:"]
        );
        for name in [FILLED_NAME, SLOPE_NAME, FLOW_ACC_NAME, TWI_NAME] {
            assert!(dir.path().join(name).exists(), "{} missing", name);
        }
    }
}
