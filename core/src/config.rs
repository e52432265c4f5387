//! Run configuration for the user position and integrity engine.
//!
//! A [`UsrConfig`] carries the handful of numeric knobs the processing chain
//! consumes: the elevation mask, the PDOP rejection threshold, the horizontal
//! and vertical alert limits used for the availability test, the percentile
//! estimator and the source of the per-satellite error budget. Every field has
//! a default so a partially specified file is valid.
//!
//! Configurations can be persisted as JSON, YAML or TOML; the format is chosen
//! from the file extension.
//!
//! ## Example
//!
//! ```
//! use usrperf::config::{PercentileMethod, UsrConfig};
//!
//! let cfg = UsrConfig {
//!     mask_angle_deg: 10.0,
//!     percentile: PercentileMethod::Histogram { resolution: 0.001 },
//!     ..UsrConfig::default()
//! };
//! assert_eq!(cfg.hal_m, 40.0);
//! ```

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::error::{Result, UsrError};

/// Default elevation mask angle (degrees).
pub const DEFAULT_MASK_ANGLE_DEG: f64 = 5.0;
/// Default PDOP above which a solution is rejected. Large enough to act only
/// as a sanity guard.
pub const DEFAULT_PDOP_MAX: f64 = 10000.0;
/// Horizontal alert limit for APV-I (meters).
pub const APV_I_HAL_M: f64 = 40.0;
/// Vertical alert limit for APV-I (meters).
pub const APV_I_VAL_M: f64 = 50.0;
/// Bin width of the histogram percentile estimator (meters).
pub const DEFAULT_HISTOGRAM_RESOLUTION_M: f64 = 0.001;

/// Estimator used for the 95th percentile of the position errors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PercentileMethod {
    /// Linear interpolation between the closest ranks of the sorted samples.
    #[default]
    Linear,
    /// Lowest histogram bin whose cumulative frequency exceeds the percentile.
    Histogram {
        /// Bin width in meters.
        resolution: f64,
    },
}

/// Where the range error and UERE variance of a satellite come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorBudget {
    /// Total range error and total UERE columns of the LOS log.
    #[default]
    Logged,
    /// Rebuilt from the SIS, ionosphere, troposphere and airborne contributors.
    Components,
}

fn default_mask_angle() -> f64 {
    DEFAULT_MASK_ANGLE_DEG
}
fn default_pdop_max() -> f64 {
    DEFAULT_PDOP_MAX
}
fn default_hal() -> f64 {
    APV_I_HAL_M
}
fn default_val() -> f64 {
    APV_I_VAL_M
}

/// Numeric parameters of one processing run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsrConfig {
    /// Satellites at or below this elevation (degrees) are not visible.
    #[serde(default = "default_mask_angle")]
    pub mask_angle_deg: f64,
    /// Solutions with a PDOP strictly above this value are rejected.
    #[serde(default = "default_pdop_max")]
    pub pdop_max: f64,
    /// Horizontal alert limit (meters).
    #[serde(default = "default_hal")]
    pub hal_m: f64,
    /// Vertical alert limit (meters).
    #[serde(default = "default_val")]
    pub val_m: f64,
    #[serde(default)]
    pub percentile: PercentileMethod,
    #[serde(default)]
    pub error_budget: ErrorBudget,
}

impl Default for UsrConfig {
    fn default() -> Self {
        UsrConfig {
            mask_angle_deg: DEFAULT_MASK_ANGLE_DEG,
            pdop_max: DEFAULT_PDOP_MAX,
            hal_m: APV_I_HAL_M,
            val_m: APV_I_VAL_M,
            percentile: PercentileMethod::default(),
            error_budget: ErrorBudget::default(),
        }
    }
}

impl UsrConfig {
    /// Check the values the engine cannot work with.
    ///
    /// # Errors
    /// Returns [`UsrError::Config`] when an alert limit is not strictly
    /// positive, the PDOP threshold is NaN, or the histogram resolution is not
    /// strictly positive.
    pub fn validate(&self) -> Result<()> {
        if !(self.hal_m > 0.0) || !(self.val_m > 0.0) {
            return Err(UsrError::Config(format!(
                "alert limits must be positive (HAL {}, VAL {})",
                self.hal_m, self.val_m
            )));
        }
        if self.pdop_max.is_nan() {
            return Err(UsrError::Config("PDOP threshold is NaN".to_string()));
        }
        if !self.mask_angle_deg.is_finite() {
            return Err(UsrError::Config(format!(
                "mask angle must be finite, got {}",
                self.mask_angle_deg
            )));
        }
        if let PercentileMethod::Histogram { resolution } = self.percentile
            && !(resolution > 0.0)
        {
            return Err(UsrError::Config(format!(
                "histogram resolution must be positive, got {resolution}"
            )));
        }
        Ok(())
    }

    /// Write the configuration to a JSON file (pretty-printed).
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(io::Error::other)
    }

    /// Read the configuration from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(file).map_err(io::Error::other)
    }
    /// Write the configuration as YAML.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = serde_yaml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }

    /// Read the configuration from YAML.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_yaml::from_reader(file).map_err(io::Error::other)
    }
    /// Write the configuration as TOML.
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = toml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }
    /// Read the configuration from TOML.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut s = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut s)?;
        toml::from_str(&s).map_err(io::Error::other)
    }
    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let p = path.as_ref();
        match extension_of(p).as_deref() {
            Some("json") => self.to_json(p),
            Some("yaml") | Some("yml") => self.to_yaml(p),
            Some("toml") => self.to_toml(p),
            _ => Err(unsupported_extension(p)),
        }
    }
    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let p = path.as_ref();
        match extension_of(p).as_deref() {
            Some("json") => Self::from_json(p),
            Some("yaml") | Some("yml") => Self::from_yaml(p),
            Some("toml") => Self::from_toml(p),
            _ => Err(unsupported_extension(p)),
        }
    }
}

fn extension_of(p: &Path) -> Option<String> {
    p.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
}

fn unsupported_extension(p: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!(
            "unsupported config extension for '{}' (expected .json, .yaml, .yml or .toml)",
            p.display()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_cfg() -> UsrConfig {
        UsrConfig {
            mask_angle_deg: 7.5,
            pdop_max: 500.0,
            hal_m: 40.0,
            val_m: 35.0,
            percentile: PercentileMethod::Histogram { resolution: 0.01 },
            error_budget: ErrorBudget::Components,
        }
    }

    #[test]
    fn defaults_match_apv_i() {
        let cfg = UsrConfig::default();
        assert_eq!(cfg.mask_angle_deg, 5.0);
        assert_eq!(cfg.pdop_max, 10000.0);
        assert_eq!(cfg.hal_m, 40.0);
        assert_eq!(cfg.val_m, 50.0);
        assert_eq!(cfg.percentile, PercentileMethod::Linear);
        assert_eq!(cfg.error_budget, ErrorBudget::Logged);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn json_roundtrip() {
        let cfg = sample_cfg();
        let f = NamedTempFile::new().unwrap();
        let path = f.path().with_extension("json");
        cfg.to_json(&path).unwrap();
        assert_eq!(UsrConfig::from_json(&path).unwrap(), cfg);
    }

    #[test]
    fn yaml_roundtrip() {
        let cfg = sample_cfg();
        let f = NamedTempFile::new().unwrap();
        let path = f.path().with_extension("yml");
        cfg.to_file(&path).unwrap();
        assert_eq!(UsrConfig::from_file(&path).unwrap(), cfg);
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = sample_cfg();
        let f = NamedTempFile::new().unwrap();
        let path = f.path().with_extension("toml");
        cfg.to_file(&path).unwrap();
        assert_eq!(UsrConfig::from_toml(&path).unwrap(), cfg);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "mask_angle_deg = 10.0\n").unwrap();
        let cfg = UsrConfig::from_file(&path).unwrap();
        assert_eq!(cfg.mask_angle_deg, 10.0);
        assert_eq!(cfg.pdop_max, DEFAULT_PDOP_MAX);
        assert_eq!(cfg.val_m, APV_I_VAL_M);
    }

    #[test]
    fn unsupported_extension_error() {
        let cfg = UsrConfig::default();
        let err = cfg.to_file("config.ini").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(UsrConfig::from_file("config.ini").is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = UsrConfig::default();
        cfg.hal_m = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = UsrConfig::default();
        cfg.percentile = PercentileMethod::Histogram { resolution: 0.0 };
        assert!(cfg.validate().is_err());

        let mut cfg = UsrConfig::default();
        cfg.pdop_max = f64::NAN;
        assert!(cfg.validate().is_err());
    }
}
