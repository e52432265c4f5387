//! USRPERF: SBAS user position and integrity performance from LOS logs.
//!
//! For each LOS log the tool writes a POS file (one navigation solution per user per epoch) and a PERF file (one
//! day-long availability and accuracy summary per user), optionally with a CSV copy of the PERF records.
//!
//! Processing parameters come from the defaults, an optional configuration file (TOML/JSON/YAML) and finally
//! the individual command line overrides, in that order of precedence.

mod common;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use common::{
    derive_output_paths, get_los_files, init_logger, validate_input_path, validate_output_path,
};
use log::{error, info};
use usrperf::config::DEFAULT_HISTOGRAM_RESOLUTION_M;
use usrperf::{ErrorBudget, PercentileMethod, UsrConfig, process_file, write_perf_csv};

const LONG_ABOUT: &str = "USRPERF: SBAS user position and integrity performance from LOS logs.

For every user of a LOS log the tool solves the weighted least-squares position error at each
epoch, derives the APV-I protection levels and safety indices, and summarises availability and
accuracy over the whole day.

Input may be a single LOS_INFO_<tag>.dat file or a directory of .dat logs. Outputs are
POS_INFO_<tag>.dat and PERF_APVI_<tag>.dat in the output directory.";

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "SBAS user position and integrity performance from LOS logs.", long_about = LONG_ABOUT)]
struct Cli {
    /// Processing configuration file (TOML/JSON/YAML); flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Process LOS logs into POS and PERF files
    Run(RunArgs),
    /// Generate a template configuration file
    #[command(name = "config")]
    CreateConfig(CreateConfigArgs),
}

#[derive(Args, Clone, Debug)]
struct RunArgs {
    /// LOS log file or directory of .dat logs
    #[arg(short, long, value_parser)]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, value_parser)]
    output: PathBuf,

    /// Elevation mask angle in degrees
    #[arg(long)]
    mask_angle: Option<f64>,

    /// PDOP above which the solution is rejected
    #[arg(long)]
    pdop_max: Option<f64>,

    /// Horizontal alert limit in meters
    #[arg(long)]
    hal: Option<f64>,

    /// Vertical alert limit in meters
    #[arg(long)]
    val: Option<f64>,

    /// 95th percentile estimator
    #[arg(long, value_enum)]
    percentile: Option<PercentileArg>,

    /// Bin width of the histogram percentile estimator in meters
    #[arg(long)]
    histogram_resolution: Option<f64>,

    /// Source of the ranging error and UERE
    #[arg(long, value_enum)]
    error_budget: Option<ErrorBudgetArg>,

    /// Also write the PERF records as CSV
    #[arg(long)]
    perf_csv: bool,
}

#[derive(Args, Clone, Debug)]
struct CreateConfigArgs {
    /// Output file; the extension selects the format (.toml, .json, .yaml)
    #[arg(short, long, default_value = "usrperf.toml")]
    output: PathBuf,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum PercentileArg {
    Linear,
    Histogram,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ErrorBudgetArg {
    Logged,
    Components,
}

impl From<ErrorBudgetArg> for ErrorBudget {
    fn from(arg: ErrorBudgetArg) -> Self {
        match arg {
            ErrorBudgetArg::Logged => ErrorBudget::Logged,
            ErrorBudgetArg::Components => ErrorBudget::Components,
        }
    }
}

/// Layer the command line overrides on top of `config`.
fn apply_overrides(mut config: UsrConfig, args: &RunArgs) -> UsrConfig {
    if let Some(mask) = args.mask_angle {
        config.mask_angle_deg = mask;
    }
    if let Some(pdop_max) = args.pdop_max {
        config.pdop_max = pdop_max;
    }
    if let Some(hal) = args.hal {
        config.hal_m = hal;
    }
    if let Some(val) = args.val {
        config.val_m = val;
    }
    let resolution = match (args.histogram_resolution, config.percentile) {
        (Some(r), _) => r,
        (None, PercentileMethod::Histogram { resolution }) => resolution,
        (None, PercentileMethod::Linear) => DEFAULT_HISTOGRAM_RESOLUTION_M,
    };
    match args.percentile {
        Some(PercentileArg::Linear) => config.percentile = PercentileMethod::Linear,
        Some(PercentileArg::Histogram) => {
            config.percentile = PercentileMethod::Histogram { resolution }
        }
        None => {
            if let PercentileMethod::Histogram { .. } = config.percentile {
                config.percentile = PercentileMethod::Histogram { resolution };
            }
        }
    }
    if let Some(budget) = args.error_budget {
        config.error_budget = budget.into();
    }
    config
}

fn load_config(path: Option<&PathBuf>) -> Result<UsrConfig> {
    match path {
        Some(path) => UsrConfig::from_file(path)
            .with_context(|| format!("loading configuration '{}'", path.display())),
        None => Ok(UsrConfig::default()),
    }
}

fn run(args: &RunArgs, config_path: Option<&PathBuf>) -> Result<()> {
    let config = apply_overrides(load_config(config_path)?, args);
    config.validate()?;
    info!("Configuration: {config:?}");

    validate_input_path(&args.input)?;
    validate_output_path(&args.output)?;
    let los_files = get_los_files(&args.input)?;
    info!("Processing {} LOS log(s)", los_files.len());

    let mut failures = 0;
    for los_file in &los_files {
        let outputs = derive_output_paths(los_file, &args.output);
        let result = process_file(los_file, &outputs.pos, &outputs.perf, &config)
            .map_err(anyhow::Error::from)
            .and_then(|(perf, summary)| {
                if args.perf_csv {
                    write_perf_csv(&perf, &outputs.csv)?;
                }
                Ok(summary)
            });
        match result {
            Ok(summary) => info!(
                "{}: {} epochs, {} users",
                los_file.display(),
                summary.epochs,
                summary.users
            ),
            Err(e) => {
                error!("Failed to process {}: {e:#}", los_file.display());
                failures += 1;
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} LOS log(s) failed", los_files.len());
    }
    Ok(())
}

fn create_config_file(args: &CreateConfigArgs, config_path: Option<&PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    config
        .to_file(&args.output)
        .with_context(|| format!("writing configuration '{}'", args.output.display()))?;
    info!("Configuration template written to {}", args.output.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(&cli.log_level, cli.log_file.as_ref())?;

    match &cli.command {
        Command::Run(args) => run(args, cli.config.as_ref()),
        Command::CreateConfig(args) => create_config_file(args, cli.config.as_ref()),
    }
}
