//! Line-of-sight (LOS) log records and the streaming epoch reader.
//!
//! A LOS log is a whitespace-delimited text file with one header line followed
//! by one row per user/satellite/epoch triple. Rows are ordered by increasing
//! second of day and all rows of one epoch are contiguous. The reader groups
//! them into epochs with a single record of lookahead, so any [`BufRead`]
//! source works (file, pipe, in-memory buffer); no seeking is required.
//!
//! Column layout (zero based):
//!
//! | idx | name       | idx | name       | idx | name       |
//! |-----|------------|-----|------------|-----|------------|
//! | 0   | SOD        | 10  | IPPLON     | 20  | SFLT       |
//! | 1   | DOY        | 11  | IPPLAT     | 21  | STROPOE    |
//! | 2   | USER-ID    | 12  | RERROR1    | 22  | SIGMTROPO  |
//! | 3   | ULON       | 13  | UERE1      | 23  | AIRERR     |
//! | 4   | ULAT       | 14  | SI1        | 24  | SIGMAIR    |
//! | 5   | FLAG       | 15  | RERROR     | 25  | UISDE      |
//! | 6   | SYSID      | 16  | UERE       | 26  | UIRE       |
//! | 7   | PRN        | 17  | SI         | 27  | UISD       |
//! | 8   | ELEV       | 18  | SREU       | 28  | SIGMAMP    |
//! | 9   | AZIM       | 19  | UDREI      | 29  | SIGMANOISE |

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use log::{debug, warn};

use crate::error::Result;

/// Number of mandatory columns in a LOS row.
pub const LOS_COLUMNS: usize = 30;

/// Flag value marking a satellite as usable for precision approach.
pub const PA_USABLE: i32 = 1;

/// One satellite observation for one user at one epoch.
#[derive(Clone, Debug, PartialEq)]
pub struct LosRecord {
    /// Second of day.
    pub sod: u32,
    pub doy: u32,
    pub user_id: u32,
    /// User longitude in degrees.
    pub user_lon: f64,
    /// User latitude in degrees.
    pub user_lat: f64,
    /// Usability flag: 1 when the satellite may enter the PA solution.
    pub flag: i32,
    pub sys_id: u32,
    pub prn: u32,
    /// Elevation in degrees.
    pub elevation: f64,
    /// Azimuth in degrees.
    pub azimuth: f64,
    pub ipp_lon: f64,
    pub ipp_lat: f64,
    /// Range error of the legacy (first) solution.
    pub range_error_legacy: f64,
    pub uere_legacy: f64,
    pub si_legacy: f64,
    /// Total range error: SREU + UISDE + tropo error + airborne error.
    pub range_error: f64,
    /// Total UERE sigma; its square is the weighting variance.
    pub uere: f64,
    pub si: f64,
    /// Signal-in-space range error at the user.
    pub sreu: f64,
    pub udrei: i32,
    /// Fast/long-term correction degradation sigma.
    pub sigma_flt: f64,
    pub tropo_error: f64,
    pub sigma_tropo: f64,
    pub air_error: f64,
    pub sigma_air: f64,
    /// Slant ionospheric delay error.
    pub uisde: f64,
    /// Slant ionospheric range error sigma.
    pub uire: f64,
    pub uisd: f64,
    pub sigma_multipath: f64,
    pub sigma_noise: f64,
}

impl LosRecord {
    /// True when the satellite is flagged as usable for precision approach.
    pub fn is_pa_usable(&self) -> bool {
        self.flag == PA_USABLE
    }
}

fn field<T: FromStr>(fields: &[&str], idx: usize) -> Option<T> {
    fields.get(idx)?.parse().ok()
}

impl FromStr for LosRecord {
    type Err = ();

    /// Parse one whitespace-delimited LOS row. Extra trailing columns are
    /// ignored; a missing column or an unparsable value is an error.
    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let f: Vec<&str> = line.split_whitespace().collect();
        if f.len() < LOS_COLUMNS {
            return Err(());
        }
        let parse = || -> Option<LosRecord> {
            Some(LosRecord {
                sod: field(&f, 0)?,
                doy: field(&f, 1)?,
                user_id: field(&f, 2)?,
                user_lon: field(&f, 3)?,
                user_lat: field(&f, 4)?,
                flag: field(&f, 5)?,
                sys_id: field(&f, 6)?,
                prn: field(&f, 7)?,
                elevation: field(&f, 8)?,
                azimuth: field(&f, 9)?,
                ipp_lon: field(&f, 10)?,
                ipp_lat: field(&f, 11)?,
                range_error_legacy: field(&f, 12)?,
                uere_legacy: field(&f, 13)?,
                si_legacy: field(&f, 14)?,
                range_error: field(&f, 15)?,
                uere: field(&f, 16)?,
                si: field(&f, 17)?,
                sreu: field(&f, 18)?,
                udrei: field(&f, 19)?,
                sigma_flt: field(&f, 20)?,
                tropo_error: field(&f, 21)?,
                sigma_tropo: field(&f, 22)?,
                air_error: field(&f, 23)?,
                sigma_air: field(&f, 24)?,
                uisde: field(&f, 25)?,
                uire: field(&f, 26)?,
                uisd: field(&f, 27)?,
                sigma_multipath: field(&f, 28)?,
                sigma_noise: field(&f, 29)?,
            })
        };
        parse().ok_or(())
    }
}

/// Streams a LOS log epoch by epoch.
///
/// Each call to [`EpochReader::next_epoch`] returns the records sharing the
/// next second-of-day value, or an empty vector once the input is exhausted.
/// The first record of the following epoch is held in a lookahead slot rather
/// than re-read. A malformed line ends the current epoch and the reader then
/// reports end-of-file forever after, so a truncated day still yields every
/// complete epoch before the damage.
pub struct EpochReader<R: BufRead> {
    source: R,
    lookahead: Option<LosRecord>,
    exhausted: bool,
    line: String,
    line_number: usize,
}

impl EpochReader<BufReader<File>> {
    /// Open a LOS log and skip its header line.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = EpochReader::new(BufReader::new(file));
        reader.skip_header()?;
        Ok(reader)
    }
}

impl<R: BufRead> EpochReader<R> {
    /// Wrap a source that is already positioned after the header line.
    pub fn new(source: R) -> Self {
        EpochReader {
            source,
            lookahead: None,
            exhausted: false,
            line: String::new(),
            line_number: 0,
        }
    }

    /// Consume and discard one line (the file header).
    pub fn skip_header(&mut self) -> Result<()> {
        self.line.clear();
        self.source.read_line(&mut self.line)?;
        self.line_number += 1;
        Ok(())
    }

    /// Read the next record, or `None` at end of input or on the first
    /// malformed line (which also latches the reader into end-of-file).
    fn read_record(&mut self) -> Option<LosRecord> {
        if self.exhausted {
            return None;
        }
        self.line.clear();
        let read = match self.source.read_line(&mut self.line) {
            Ok(n) => n,
            Err(e) => {
                warn!("LOS read error after line {}: {e}", self.line_number);
                0
            }
        };
        if read == 0 {
            self.exhausted = true;
            return None;
        }
        self.line_number += 1;
        match self.line.parse::<LosRecord>() {
            Ok(record) => Some(record),
            Err(()) => {
                warn!(
                    "malformed LOS line {}, treating as end of file",
                    self.line_number
                );
                self.exhausted = true;
                None
            }
        }
    }

    /// Return all records of the next epoch, in file order.
    ///
    /// An empty vector signals end of file.
    pub fn next_epoch(&mut self) -> Vec<LosRecord> {
        let first = match self.lookahead.take() {
            Some(record) => record,
            None => match self.read_record() {
                Some(record) => record,
                None => return Vec::new(),
            },
        };
        let sod = first.sod;
        let mut epoch = vec![first];
        while let Some(record) = self.read_record() {
            if record.sod != sod {
                self.lookahead = Some(record);
                break;
            }
            epoch.push(record);
        }
        debug!("epoch SOD {sod}: {} LOS records", epoch.len());
        epoch
    }
}

impl<R: BufRead> Iterator for EpochReader<R> {
    type Item = Vec<LosRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let epoch = self.next_epoch();
        if epoch.is_empty() { None } else { Some(epoch) }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Build a LOS row with the fields the engine looks at; every other column
    /// gets a harmless constant.
    pub(crate) fn los_line(
        sod: u32,
        user: u32,
        flag: i32,
        prn: u32,
        elev: f64,
        azim: f64,
        rerror: f64,
        uere: f64,
    ) -> String {
        format!(
            "{sod} 1 {user} 10.0 45.0 {flag} 1 {prn} {elev} {azim} 11.0 46.0 \
             0.0 0.0 0.0 {rerror} {uere} 0.0 0.1 5 0.2 0.3 0.4 0.5 0.6 0.7 0.8 0.9 0.1 0.1\n"
        )
    }

    #[test]
    fn parse_full_row() {
        let rec: LosRecord = los_line(100, 3, 1, 12, 35.5, 270.0, 1.25, 2.0)
            .parse()
            .unwrap();
        assert_eq!(rec.sod, 100);
        assert_eq!(rec.user_id, 3);
        assert_eq!(rec.prn, 12);
        assert!(rec.is_pa_usable());
        assert_eq!(rec.elevation, 35.5);
        assert_eq!(rec.azimuth, 270.0);
        assert_eq!(rec.range_error, 1.25);
        assert_eq!(rec.uere, 2.0);
        assert_eq!(rec.udrei, 5);
        assert_eq!(rec.sigma_noise, 0.1);
    }

    #[test]
    fn parse_rejects_short_or_garbled_rows() {
        assert!("1 2 3".parse::<LosRecord>().is_err());
        assert!("".parse::<LosRecord>().is_err());
        let garbled = los_line(100, 3, 1, 12, 35.5, 270.0, 1.25, 2.0).replace("35.5", "abc");
        assert!(garbled.parse::<LosRecord>().is_err());
    }

    #[test]
    fn epochs_are_split_on_time_change() {
        let mut data = String::new();
        data.push_str(&los_line(0, 1, 1, 1, 30.0, 0.0, 0.0, 1.0));
        data.push_str(&los_line(0, 1, 1, 2, 30.0, 90.0, 0.0, 1.0));
        data.push_str(&los_line(0, 2, 1, 1, 30.0, 0.0, 0.0, 1.0));
        data.push_str(&los_line(50, 1, 1, 1, 31.0, 0.0, 0.0, 1.0));
        data.push_str(&los_line(100, 1, 1, 1, 32.0, 0.0, 0.0, 1.0));
        data.push_str(&los_line(100, 2, 1, 1, 32.0, 0.0, 0.0, 1.0));

        let mut reader = EpochReader::new(Cursor::new(data));
        let sizes: Vec<(u32, usize)> = std::iter::from_fn(|| {
            let epoch = reader.next_epoch();
            (!epoch.is_empty()).then(|| (epoch[0].sod, epoch.len()))
        })
        .collect();
        assert_eq!(sizes, vec![(0, 3), (50, 1), (100, 2)]);
        // Exhausted readers keep reporting end of file.
        assert!(reader.next_epoch().is_empty());
        assert!(reader.next_epoch().is_empty());
    }

    #[test]
    fn malformed_line_terminates_iteration() {
        let mut data = String::new();
        data.push_str(&los_line(0, 1, 1, 1, 30.0, 0.0, 0.0, 1.0));
        data.push_str(&los_line(0, 1, 1, 2, 30.0, 90.0, 0.0, 1.0));
        data.push_str("0 1 truncated\n");
        data.push_str(&los_line(50, 1, 1, 1, 31.0, 0.0, 0.0, 1.0));

        let epochs: Vec<Vec<LosRecord>> = EpochReader::new(Cursor::new(data)).collect();
        assert_eq!(epochs.len(), 1);
        assert_eq!(epochs[0].len(), 2);
    }

    #[test]
    fn blank_line_is_malformed() {
        let mut data = String::new();
        data.push_str(&los_line(0, 1, 1, 1, 30.0, 0.0, 0.0, 1.0));
        data.push('\n');
        data.push_str(&los_line(50, 1, 1, 1, 31.0, 0.0, 0.0, 1.0));
        let epochs: Vec<Vec<LosRecord>> = EpochReader::new(Cursor::new(data)).collect();
        assert_eq!(epochs.len(), 1);
    }

    #[test]
    fn from_path_skips_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("LOS_INFO_Y11D006_G123_50s.dat");
        let mut data = String::from("SOD DOY USER-ID ULON ULAT FLAG ...\n");
        data.push_str(&los_line(0, 1, 1, 1, 30.0, 0.0, 0.0, 1.0));
        std::fs::write(&path, data).unwrap();

        let epochs: Vec<Vec<LosRecord>> = EpochReader::from_path(&path).unwrap().collect();
        assert_eq!(epochs.len(), 1);
        assert_eq!(epochs[0][0].user_id, 1);
    }

    #[test]
    fn empty_input_has_no_epochs() {
        let mut reader = EpochReader::new(Cursor::new(String::new()));
        assert!(reader.next_epoch().is_empty());
    }
}
