//! Day-long user performance: incremental aggregation and finalisation.
//!
//! One [`UsrPerformance`] accumulator exists per user grid point for the whole
//! run. [`UsrPerformance::observe`] is fed every POS record of that user in
//! epoch order; [`UsrPerformance::finalize`] reduces the collected samples
//! into a [`UsrPerfRecord`] at end of file.
//!
//! An epoch is *available* when both protection levels are strictly inside
//! the alert limits, strictly positive, and the solution used at least four
//! satellites. Only available epochs contribute position error samples, so
//! RMS and percentiles describe the service actually delivered.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::config::{PercentileMethod, UsrConfig};
use crate::error::Result;
use crate::position::UsrPosRecord;
use crate::solver::MIN_SATELLITES;
use crate::stats::{percentile, rms};

/// Initial value of the MIN fields; reset to `0` if never updated.
pub const MIN_SENTINEL: f64 = 1.0e12;

/// Percentile reported in the PERF file.
pub const PERF_PERCENTILE: f64 = 95.0;

/// Column names of the PERF file, in output order.
pub const PERF_COLUMNS: [&str; 23] = [
    "USER-ID",
    "ULON",
    "ULAT",
    "NSAMP",
    "NVS-MIN",
    "NVS-MAX",
    "AVAILSAMP",
    "AVAILABILITY",
    "HPE-RMS",
    "VPE-RMS",
    "HPE-95",
    "VPE-95",
    "HPE-MAX",
    "VPE-MAX",
    "HSI-MAX",
    "VSI-MAX",
    "HPL-MAX",
    "VPL-MAX",
    "HPL-MIN",
    "VPL-MIN",
    "HDOP-MAX",
    "VDOP-MAX",
    "PDOP-MAX",
];

/// Alert limits and sample reduction settings used by the aggregators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvailabilityCriteria {
    pub hal_m: f64,
    pub val_m: f64,
    pub percentile: PercentileMethod,
}

impl From<&UsrConfig> for AvailabilityCriteria {
    fn from(cfg: &UsrConfig) -> Self {
        AvailabilityCriteria {
            hal_m: cfg.hal_m,
            val_m: cfg.val_m,
            percentile: cfg.percentile,
        }
    }
}

impl AvailabilityCriteria {
    /// True when the epoch counts toward availability.
    ///
    /// A non-finite position error never counts, so it cannot reach the RMS
    /// or percentile samples.
    pub fn is_available(&self, pos: &UsrPosRecord) -> bool {
        pos.hpe.is_finite()
            && pos.vpe.is_finite()
            && pos.hpl < self.hal_m
            && pos.vpl < self.val_m
            && pos.hpl > 0.0
            && pos.vpl > 0.0
            && pos.nvs_pa >= MIN_SATELLITES
    }
}

/// Final performance of one user over the processed day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsrPerfRecord {
    pub user_id: u32,
    pub lon: f64,
    pub lat: f64,
    /// Epochs in which the user appeared.
    pub total_epochs: u32,
    /// Epochs with an accepted PA solution.
    pub solved_epochs: u32,
    pub nvs_min: u32,
    pub nvs_max: u32,
    pub available_epochs: u32,
    /// Percentage of available epochs over all epochs.
    pub availability: f64,
    pub hpe_rms: f64,
    pub vpe_rms: f64,
    pub hpe_95: f64,
    pub vpe_95: f64,
    pub hpe_max: f64,
    pub vpe_max: f64,
    pub hsi_max: f64,
    pub vsi_max: f64,
    pub hpl_max: f64,
    pub vpl_max: f64,
    pub hpl_min: f64,
    pub vpl_min: f64,
    pub hdop_max: f64,
    pub vdop_max: f64,
    pub pdop_max: f64,
}

impl UsrPerfRecord {
    /// Serialize to one PERF row (with trailing newline).
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(256);
        // Writing into a String cannot fail.
        let _ = write!(
            line,
            "{:7} {:10.3} {:10.3} {:8} {:8} {:8} {:10} ",
            self.user_id,
            self.lon,
            self.lat,
            self.total_epochs,
            self.nvs_min,
            self.nvs_max,
            self.available_epochs
        );
        for value in [
            self.availability,
            self.hpe_rms,
            self.vpe_rms,
            self.hpe_95,
            self.vpe_95,
            self.hpe_max,
            self.vpe_max,
            self.hsi_max,
            self.vsi_max,
            self.hpl_max,
            self.vpl_max,
            self.hpl_min,
            self.vpl_min,
            self.hdop_max,
            self.vdop_max,
            self.pdop_max,
        ] {
            let _ = write!(line, "{value:10.4} ");
        }
        line.push('\n');
        line
    }
}

/// Running performance state of one user.
#[derive(Debug, Clone)]
pub struct UsrPerformance {
    user_id: u32,
    lon: f64,
    lat: f64,
    total_epochs: u32,
    solved_epochs: u32,
    available_epochs: u32,
    nvs_min: Option<u32>,
    nvs_max: u32,
    hpe_samples: Vec<f64>,
    vpe_samples: Vec<f64>,
    hpe_max: f64,
    vpe_max: f64,
    hsi_max: f64,
    vsi_max: f64,
    hpl_max: f64,
    vpl_max: f64,
    hpl_min: f64,
    vpl_min: f64,
    hdop_max: f64,
    vdop_max: f64,
    pdop_max: f64,
}

impl UsrPerformance {
    pub fn new(user_id: u32, lon: f64, lat: f64) -> Self {
        UsrPerformance {
            user_id,
            lon,
            lat,
            total_epochs: 0,
            solved_epochs: 0,
            available_epochs: 0,
            nvs_min: None,
            nvs_max: 0,
            hpe_samples: Vec::new(),
            vpe_samples: Vec::new(),
            hpe_max: 0.0,
            vpe_max: 0.0,
            hsi_max: 0.0,
            vsi_max: 0.0,
            hpl_max: 0.0,
            vpl_max: 0.0,
            hpl_min: MIN_SENTINEL,
            vpl_min: MIN_SENTINEL,
            hdop_max: 0.0,
            vdop_max: 0.0,
            pdop_max: 0.0,
        }
    }

    /// Account for one epoch of this user.
    pub fn observe(&mut self, pos: &UsrPosRecord, criteria: &AvailabilityCriteria) {
        debug_assert_eq!(pos.user_id, self.user_id);
        self.total_epochs += 1;

        if !pos.solution_used {
            return;
        }
        self.solved_epochs += 1;
        let nvs_pa = pos.nvs_pa as u32;
        self.nvs_min = Some(self.nvs_min.map_or(nvs_pa, |min| min.min(nvs_pa)));
        self.nvs_max = self.nvs_max.max(nvs_pa);
        // Safety indices are tracked on every solved epoch, available or not.
        // +inf becomes the maximum; NaN never does.
        if pos.hsi > self.hsi_max {
            self.hsi_max = pos.hsi;
        }
        if pos.vsi > self.vsi_max {
            self.vsi_max = pos.vsi;
        }

        if !criteria.is_available(pos) {
            return;
        }
        self.available_epochs += 1;
        self.hpe_samples.push(pos.hpe);
        self.vpe_samples.push(pos.vpe);
        self.hpe_max = self.hpe_max.max(pos.hpe);
        self.vpe_max = self.vpe_max.max(pos.vpe);
        self.hpl_max = self.hpl_max.max(pos.hpl);
        self.vpl_max = self.vpl_max.max(pos.vpl);
        self.hpl_min = self.hpl_min.min(pos.hpl);
        self.vpl_min = self.vpl_min.min(pos.vpl);
        self.hdop_max = self.hdop_max.max(pos.hdop);
        self.vdop_max = self.vdop_max.max(pos.vdop);
        self.pdop_max = self.pdop_max.max(pos.pdop);
    }

    /// Reduce the collected samples into the final record.
    pub fn finalize(&self, criteria: &AvailabilityCriteria) -> UsrPerfRecord {
        let availability = if self.total_epochs == 0 {
            0.0
        } else {
            f64::from(self.available_epochs) / f64::from(self.total_epochs) * 100.0
        };
        let unset_to_zero = |v: f64| if v == MIN_SENTINEL { 0.0 } else { v };
        UsrPerfRecord {
            user_id: self.user_id,
            lon: self.lon,
            lat: self.lat,
            total_epochs: self.total_epochs,
            solved_epochs: self.solved_epochs,
            nvs_min: self.nvs_min.unwrap_or(0),
            nvs_max: self.nvs_max,
            available_epochs: self.available_epochs,
            availability,
            hpe_rms: rms(&self.hpe_samples),
            vpe_rms: rms(&self.vpe_samples),
            hpe_95: percentile(&self.hpe_samples, PERF_PERCENTILE, criteria.percentile),
            vpe_95: percentile(&self.vpe_samples, PERF_PERCENTILE, criteria.percentile),
            hpe_max: self.hpe_max,
            vpe_max: self.vpe_max,
            hsi_max: self.hsi_max,
            vsi_max: self.vsi_max,
            hpl_max: self.hpl_max,
            vpl_max: self.vpl_max,
            hpl_min: unset_to_zero(self.hpl_min),
            vpl_min: unset_to_zero(self.vpl_min),
            hdop_max: self.hdop_max,
            vdop_max: self.vdop_max,
            pdop_max: self.pdop_max,
        }
    }
}

/// PERF header comment line (with trailing newline).
pub fn perf_header() -> String {
    format!("# {}\n", PERF_COLUMNS.join(" "))
}

/// Write a complete PERF file body (header and one row per record).
pub fn write_perf<W: Write>(mut out: W, records: &[UsrPerfRecord]) -> io::Result<()> {
    out.write_all(perf_header().as_bytes())?;
    for record in records {
        out.write_all(record.to_line().as_bytes())?;
    }
    out.flush()
}

/// Export the final records as CSV with named columns.
///
/// # Example
///
/// ```no_run
/// use usrperf::performance::write_perf_csv;
///
/// write_perf_csv(&[], "perf.csv").expect("Failed to write CSV");
/// ```
pub fn write_perf_csv<P: AsRef<Path>>(records: &[UsrPerfRecord], path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
