//! Per-user, per-epoch position records and the POS file format.
//!
//! The POS file is positional: a header comment line followed by one row per
//! user per epoch, fields in a fixed order with fixed-width printf-style
//! formats, each field followed by a single space:
//!
//! | field    | format  | field | format  |
//! |----------|---------|-------|---------|
//! | SOD      | `%7d`   | HPL   | `%10.3f`|
//! | USER-ID  | `%6d`   | VPL   | `%10.3f`|
//! | ULON     | `%10.3f`| HSI   | `%10.3f`|
//! | ULAT     | `%10.3f`| VSI   | `%10.3f`|
//! | SOL-FLAG | `%7d`   | PDOP  | `%10.3f`|
//! | NVS      | `%8d`   | HDOP  | `%10.3f`|
//! | NVS-PA   | `%8d`   | VDOP  | `%10.3f`|
//! | HPE      | `%10.3f`|       |         |
//! | VPE      | `%10.3f`|       |         |

use std::fmt::Write as _;
use std::io::{self, Write};
use std::str::FromStr;

/// Column names of the POS file, in output order.
pub const POS_COLUMNS: [&str; 16] = [
    "SOD", "USER-ID", "ULON", "ULAT", "SOL-FLAG", "NVS", "NVS-PA", "HPE", "VPE", "HPL", "VPL",
    "HSI", "VSI", "PDOP", "HDOP", "VDOP",
];

/// Solution of one user at one epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsrPosRecord {
    pub sod: u32,
    pub user_id: u32,
    pub lon: f64,
    pub lat: f64,
    /// True when the PA solution was computed and accepted.
    pub solution_used: bool,
    /// Visible satellites (above the mask).
    pub nvs: usize,
    /// Satellites in the PA solution.
    pub nvs_pa: usize,
    pub hpe: f64,
    pub vpe: f64,
    pub hpl: f64,
    pub vpl: f64,
    pub hsi: f64,
    pub vsi: f64,
    pub pdop: f64,
    pub hdop: f64,
    pub vdop: f64,
}

impl UsrPosRecord {
    /// Record with identity and counts set and every derived field zero.
    pub fn unsolved(sod: u32, user_id: u32, lon: f64, lat: f64, nvs: usize, nvs_pa: usize) -> Self {
        UsrPosRecord {
            sod,
            user_id,
            lon,
            lat,
            nvs,
            nvs_pa,
            ..UsrPosRecord::default()
        }
    }

    /// Serialize to one POS row (with trailing newline).
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(160);
        // Writing into a String cannot fail.
        let _ = write!(
            line,
            "{:7} {:6} {:10.3} {:10.3} {:7} {:8} {:8} ",
            self.sod,
            self.user_id,
            self.lon,
            self.lat,
            u8::from(self.solution_used),
            self.nvs,
            self.nvs_pa
        );
        for value in [
            self.hpe, self.vpe, self.hpl, self.vpl, self.hsi, self.vsi, self.pdop, self.hdop,
            self.vdop,
        ] {
            let _ = write!(line, "{value:10.3} ");
        }
        line.push('\n');
        line
    }

    /// Parse one POS row, see the [`FromStr`] impl.
    pub fn from_line(line: &str) -> Result<Self, String> {
        line.parse()
    }
}

impl FromStr for UsrPosRecord {
    type Err = String;

    /// Parse a POS row back. Values carry the 3-decimal rounding of the file.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let f: Vec<&str> = line.split_whitespace().collect();
        if f.len() != POS_COLUMNS.len() {
            return Err(format!(
                "expected {} POS fields, found {}",
                POS_COLUMNS.len(),
                f.len()
            ));
        }
        fn num<T: FromStr>(f: &[&str], i: usize) -> Result<T, String> {
            f[i].parse()
                .map_err(|_| format!("bad {} value '{}'", POS_COLUMNS[i], f[i]))
        }
        let flag: u8 = num(&f, 4)?;
        Ok(UsrPosRecord {
            sod: num(&f, 0)?,
            user_id: num(&f, 1)?,
            lon: num(&f, 2)?,
            lat: num(&f, 3)?,
            solution_used: flag == 1,
            nvs: num(&f, 5)?,
            nvs_pa: num(&f, 6)?,
            hpe: num(&f, 7)?,
            vpe: num(&f, 8)?,
            hpl: num(&f, 9)?,
            vpl: num(&f, 10)?,
            hsi: num(&f, 11)?,
            vsi: num(&f, 12)?,
            pdop: num(&f, 13)?,
            hdop: num(&f, 14)?,
            vdop: num(&f, 15)?,
        })
    }
}

/// POS header comment line (with trailing newline).
pub fn pos_header() -> String {
    format!("# {}\n", POS_COLUMNS.join(" "))
}

/// Streams POS rows to any writer.
pub struct PosWriter<W: Write> {
    out: W,
    rows: usize,
}

impl<W: Write> PosWriter<W> {
    /// Wrap `out` and write the header line.
    pub fn new(mut out: W) -> io::Result<Self> {
        out.write_all(pos_header().as_bytes())?;
        Ok(PosWriter { out, rows: 0 })
    }

    pub fn write(&mut self, record: &UsrPosRecord) -> io::Result<()> {
        self.rows += 1;
        self.out.write_all(record.to_line().as_bytes())
    }

    /// Number of rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
