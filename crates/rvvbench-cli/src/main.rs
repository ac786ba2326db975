//! rvvbench: RVV convolution benchmark driver
//!
//! Generates seeded input and kernel tensors, runs the direct, im2col + GEMM
//! and specialized 3×3 convolution variants, writes every result as a raw
//! float32 file and checks each one against the scalar direct convolution.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rvvbench_common::{BenchConfig, LaneWidth};
use tracing::{error, info};

mod driver;
mod shape_args;

use driver::{Driver, print_summary};

/// Default configuration file looked up in the working directory.
const DEFAULT_CONFIG: &str = "rvvbench.toml";

/// RVV convolution benchmark driver
#[derive(Parser, Debug)]
#[command(name = "rvvbench")]
#[command(about = "Run and cross-check the convolution kernel family")]
#[command(long_about = r#"
Runs the scalar direct convolution (the reference), its lane-width vector
variants, the rayon variant, im2col + blocked GEMM and, for 3x3 stride-1
shapes, the specialized 3x3 stencil with channel accumulation. Every output
is written as raw little-endian float32 to the output directory and compared
against the reference.

Examples:
  # Default shape 1x3x8x8, 3x3 kernel, stride 1, pad 1
  rvvbench

  # N Cin Cout H W kH kW sH sW pH pW
  rvvbench 2 16 32 56 56 3 3 1 1 1 1

  # Only the m8 width, JSON report, no binaries
  rvvbench --lanes m8 --report report.json --no-write
"#)]
#[command(version)]
struct Cli {
    /// Shape: N Cin Cout H W [kH kW [sH sW [pH pW]]]
    #[arg(value_name = "DIMS", num_args = 0..=11, allow_negative_numbers = true)]
    dims: Vec<i64>,

    /// Configuration file path
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<String>,

    /// Seed for input and kernel generation
    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    /// Per-element parity tolerance
    #[arg(long, value_name = "TOL")]
    tolerance: Option<f32>,

    /// Directory for the raw float32 dumps
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Lane widths to run (m1, m2, m4, m8)
    #[arg(long, value_name = "WIDTHS", value_delimiter = ',')]
    lanes: Option<Vec<LaneWidth>>,

    /// Output rows per pass for the batched 3x3 variant
    #[arg(long, value_name = "N")]
    batch_rows: Option<usize>,

    /// Skip writing binary dumps
    #[arg(long)]
    no_write: bool,

    /// Write a JSON parity report to this path
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_configuration(&cli)?;
    setup_logging(&config, cli.log_level.as_deref())?;

    if cli.print_config {
        println!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let summary = match Driver::new(&config).run() {
        Ok(summary) => summary,
        Err(e) => {
            error!("Benchmark failed: {}", e);
            for cause in e.chain().skip(1) {
                error!("  Caused by: {}", cause);
            }
            std::process::exit(1);
        }
    };

    print_summary(&summary);

    if !summary.all_passed {
        let failed: Vec<_> = summary.failures().map(|r| r.variant.as_str()).collect();
        error!("parity check failed for: {}", failed.join(", "));
        std::process::exit(1);
    }
    info!("all {} variants match the reference", summary.reports.len());
    Ok(())
}

/// Load configuration from file and environment, then merge CLI arguments
fn load_configuration(cli: &Cli) -> Result<BenchConfig> {
    let mut config = match &cli.config {
        Some(path) => BenchConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG);
            if path.exists() {
                BenchConfig::from_file(&path).with_context(|| {
                    format!("Failed to load configuration from {}", path.display())
                })?
            } else {
                BenchConfig::default()
            }
        }
    };
    config.apply_env_overrides().context("Invalid RVVBENCH_* environment override")?;

    config.shape = shape_args::apply_positional(config.shape, &cli.dims)?;
    if let Some(seed) = cli.seed {
        config.run.seed = seed;
    }
    if let Some(tolerance) = cli.tolerance {
        config.run.tolerance = tolerance;
    }
    if let Some(dir) = &cli.output_dir {
        config.run.output_dir = dir.clone();
    }
    if let Some(lanes) = &cli.lanes {
        config.run.lane_widths = lanes.clone();
    }
    if let Some(rows) = cli.batch_rows {
        config.run.batch_rows = rows;
    }
    if cli.no_write {
        config.run.write_binaries = false;
    }
    if let Some(report) = &cli.report {
        config.run.report = Some(report.clone());
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }

    config.validate().context("Failed to build configuration")?;
    Ok(config)
}

/// Setup logging based on configuration
fn setup_logging(config: &BenchConfig, log_level_override: Option<&str>) -> Result<()> {
    let level = log_level_override.unwrap_or(&config.logging.level);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match config.logging.format.as_str() {
        "json" => subscriber.json().with_timer(tracing_subscriber::fmt::time::uptime()).init(),
        "compact" => subscriber.compact().init(),
        _ => subscriber.pretty().init(),
    }

    Ok(())
}
