//! Shared helpers for the command line front end.
//!
//! - Logger initialization
//! - Path validation and LOS log discovery
//! - Output file naming

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Extension of LOS log files.
pub const LOS_EXTENSION: &str = "dat";

/// Initialize the logger with the specified configuration.
///
/// # Arguments
/// * `log_level` - Log level string (off, error, warn, info, debug, trace)
/// * `log_file` - Optional path to log file (logs to stderr if None)
///
/// # Errors
/// Returns an error if the log file cannot be opened or logger initialization fails.
pub fn init_logger(log_level: &str, log_file: Option<&PathBuf>) -> Result<()> {
    use std::io::Write;

    let level = log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
        log::LevelFilter::Info
    });

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    });

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory '{}'", parent.display()))?;
        }
        let target = Box::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
                .with_context(|| format!("opening log file '{}'", log_path.display()))?,
        );
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.try_init()?;
    Ok(())
}

/// Validate input path exists and is either a file or directory.
pub fn validate_input_path(input: &Path) -> Result<()> {
    if !input.exists() {
        bail!("Input path '{}' does not exist.", input.display());
    }
    if !input.is_file() && !input.is_dir() {
        bail!(
            "Input path '{}' is neither a file nor a directory.",
            input.display()
        );
    }
    Ok(())
}

fn is_los_file(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some(LOS_EXTENSION)
}

/// Get all LOS logs from a path (either a single `.dat` file or every `.dat`
/// file of a directory, sorted).
///
/// # Errors
/// Returns an error if the file is not a `.dat` file, the directory holds
/// none, or the path is neither a file nor a directory.
pub fn get_los_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        if !is_los_file(input) {
            bail!("Input file '{}' is not a .dat LOS log.", input.display());
        }
        Ok(vec![input.to_path_buf()])
    } else if input.is_dir() {
        let mut los_files: Vec<PathBuf> = std::fs::read_dir(input)
            .with_context(|| format!("reading directory '{}'", input.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_los_file(path))
            .collect();

        if los_files.is_empty() {
            bail!("No .dat LOS logs found in directory '{}'.", input.display());
        }

        los_files.sort();
        Ok(los_files)
    } else {
        bail!(
            "Input path '{}' is neither a file nor a directory.",
            input.display()
        )
    }
}

/// Create the output directory if it does not exist yet.
pub fn validate_output_path(output: &Path) -> Result<()> {
    if !output.exists() {
        std::fs::create_dir_all(output)
            .with_context(|| format!("creating output directory '{}'", output.display()))?;
    }
    Ok(())
}

/// Output files derived from one LOS log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub pos: PathBuf,
    pub perf: PathBuf,
    pub csv: PathBuf,
}

/// Derive the POS, PERF and PERF CSV paths for a LOS log.
///
/// `LOS_INFO_<tag>.dat` maps to `POS_INFO_<tag>.dat` and
/// `PERF_APVI_<tag>.dat`; any other stem gets a `POS_` / `PERF_` prefix.
pub fn derive_output_paths(los_file: &Path, output_dir: &Path) -> OutputPaths {
    let stem = los_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (pos, perf) = match stem.strip_prefix("LOS_INFO_") {
        Some(tag) => (format!("POS_INFO_{tag}"), format!("PERF_APVI_{tag}")),
        None => (format!("POS_{stem}"), format!("PERF_{stem}")),
    };
    OutputPaths {
        pos: output_dir.join(format!("{pos}.{LOS_EXTENSION}")),
        csv: output_dir.join(format!("{perf}.csv")),
        perf: output_dir.join(format!("{perf}.{LOS_EXTENSION}")),
    }
}
