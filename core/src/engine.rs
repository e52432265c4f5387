//! The user position and integrity processing loop.
//!
//! [`compute_user_epoch`] runs the per user-epoch pipeline:
//!
//! 1. satellite selection against the mask and the PA flag,
//! 2. DOPs and the PDOP rejection test,
//! 3. weighted least-squares position error,
//! 4. protection levels and safety indices.
//!
//! [`UsrEngine`] drives it over a whole LOS log: every epoch is split by user,
//! each user's POS row is written as soon as it is computed, and the row is
//! folded into that user's [`UsrPerformance`] accumulator. The PERF records
//! are only produced once the input is exhausted.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use log::{debug, info};

use crate::config::UsrConfig;
use crate::error::Result;
use crate::geometry::Geometry;
use crate::integrity::{ProtectionLevels, safety_index};
use crate::los::{EpochReader, LosRecord};
use crate::performance::{AvailabilityCriteria, UsrPerfRecord, UsrPerformance, write_perf};
use crate::position::{PosWriter, UsrPosRecord};
use crate::selection::select_satellites;
use crate::solver::{DilutionOfPrecision, MIN_SATELLITES, solve_position_error};

/// Compute the POS record of one user at one epoch.
///
/// `records` holds every LOS record of that user in the epoch; identity and
/// time are taken from the first one. An empty slice yields an all-zero
/// record.
///
/// # Errors
/// [`UsrError::InvalidRecord`](crate::UsrError::InvalidRecord) when a usable
/// satellite carries a zero, negative or non-finite UERE or a non-finite
/// range error; [`UsrError::Numerical`](crate::UsrError::Numerical) when the
/// pseudo-inverse fails. Too few satellites or a PDOP above the threshold are
/// encoded as an unused solution.
pub fn compute_user_epoch(records: &[LosRecord], config: &UsrConfig) -> Result<UsrPosRecord> {
    let Some(first) = records.first() else {
        return Ok(UsrPosRecord::default());
    };
    let selection = select_satellites(records, config.mask_angle_deg);
    let mut pos = UsrPosRecord::unsolved(
        first.sod,
        first.user_id,
        first.user_lon,
        first.user_lat,
        selection.nvs,
        selection.nvs_pa(),
    );
    if selection.nvs_pa() < MIN_SATELLITES {
        return Ok(pos);
    }

    let geometry = Geometry::build(&selection.usable, config.error_budget)?;
    let dop = DilutionOfPrecision::from_geometry(&geometry.g);
    pos.pdop = dop.pdop;
    pos.hdop = dop.hdop;
    pos.vdop = dop.vdop;
    // NaN and +inf PDOPs are rejected with the rest.
    if !(dop.pdop <= config.pdop_max) {
        debug!(
            "SOD {} user {}: PDOP {:.3} above {}, solution rejected",
            pos.sod, pos.user_id, dop.pdop, config.pdop_max
        );
        return Ok(pos);
    }

    let solution = solve_position_error(&geometry)?;
    let pl = ProtectionLevels::from_covariance(&solution.covariance);
    pos.solution_used = true;
    pos.hpe = solution.error.hpe();
    pos.vpe = solution.error.vpe();
    pos.hpl = pl.hpl;
    pos.vpl = pl.vpl;
    pos.hsi = safety_index(pos.hpe, pos.hpl);
    pos.vsi = safety_index(pos.vpe, pos.vpl);
    Ok(pos)
}

/// Split one epoch into per-user record groups, in order of first appearance.
///
/// Records of a user need not be contiguous; each group keeps file order.
pub fn group_by_user(epoch: Vec<LosRecord>) -> Vec<Vec<LosRecord>> {
    let mut index: HashMap<u32, usize> = HashMap::new();
    let mut groups: Vec<Vec<LosRecord>> = Vec::new();
    for record in epoch {
        let slot = *index.entry(record.user_id).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(record);
    }
    groups
}

/// Totals of one processing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub epochs: usize,
    pub pos_rows: usize,
    pub users: usize,
}

/// Day-long processing state: configuration plus one accumulator per user.
#[derive(Debug, Clone)]
pub struct UsrEngine {
    config: UsrConfig,
    criteria: AvailabilityCriteria,
    users: BTreeMap<u32, UsrPerformance>,
    epochs: usize,
}

impl UsrEngine {
    /// Create an engine after validating `config`.
    pub fn new(config: UsrConfig) -> Result<Self> {
        config.validate()?;
        let criteria = AvailabilityCriteria::from(&config);
        Ok(UsrEngine {
            config,
            criteria,
            users: BTreeMap::new(),
            epochs: 0,
        })
    }

    /// Number of epochs processed so far.
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Process one epoch: write a POS row per user and update the accumulators.
    pub fn process_epoch<W: Write>(
        &mut self,
        epoch: Vec<LosRecord>,
        pos_writer: &mut PosWriter<W>,
    ) -> Result<()> {
        if epoch.is_empty() {
            return Ok(());
        }
        self.epochs += 1;
        for records in group_by_user(epoch) {
            let pos = compute_user_epoch(&records, &self.config)?;
            pos_writer.write(&pos)?;
            self.users
                .entry(pos.user_id)
                .or_insert_with(|| UsrPerformance::new(pos.user_id, pos.lon, pos.lat))
                .observe(&pos, &self.criteria);
        }
        Ok(())
    }

    /// Consume every epoch of `reader`.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        reader: &mut EpochReader<R>,
        pos_writer: &mut PosWriter<W>,
    ) -> Result<()> {
        loop {
            let epoch = reader.next_epoch();
            if epoch.is_empty() {
                break;
            }
            self.process_epoch(epoch, pos_writer)?;
        }
        Ok(())
    }

    /// Final performance of every user, ordered by user id.
    pub fn finalize(&self) -> Vec<UsrPerfRecord> {
        self.users
            .values()
            .map(|user| user.finalize(&self.criteria))
            .collect()
    }
}

/// Process a LOS log file into its POS and PERF files.
///
/// Returns the final performance records (also written to `perf_path`) and
/// the run totals.
///
/// # Example
///
/// ```no_run
/// use usrperf::{UsrConfig, process_file};
///
/// let (perf, summary) = process_file(
///     "LOS_INFO_2024_001.dat",
///     "POS_INFO_2024_001.dat",
///     "PERF_APVI_2024_001.dat",
///     &UsrConfig::default(),
/// )
/// .expect("processing failed");
/// println!("{} users over {} epochs", perf.len(), summary.epochs);
/// ```
pub fn process_file<P, Q, S>(
    los_path: P,
    pos_path: Q,
    perf_path: S,
    config: &UsrConfig,
) -> Result<(Vec<UsrPerfRecord>, RunSummary)>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    S: AsRef<Path>,
{
    let mut engine = UsrEngine::new(config.clone())?;
    info!("Reading LOS log {}", los_path.as_ref().display());
    let mut reader = EpochReader::from_path(&los_path)?;
    let mut pos_writer = PosWriter::new(BufWriter::new(File::create(&pos_path)?))?;
    engine.run(&mut reader, &mut pos_writer)?;
    let pos_rows = pos_writer.rows();
    pos_writer.finish()?;

    let perf = engine.finalize();
    write_perf(BufWriter::new(File::create(&perf_path)?), &perf)?;
    let summary = RunSummary {
        epochs: engine.epochs(),
        pos_rows,
        users: perf.len(),
    };
    info!(
        "Processed {} epochs, {} POS rows, {} users -> {}, {}",
        summary.epochs,
        summary.pos_rows,
        summary.users,
        pos_path.as_ref().display(),
        perf_path.as_ref().display()
    );
    Ok((perf, summary))
}
