//! Per-user satellite selection for one epoch.
//!
//! Every LOS record of a user is classified as masked (at or below the
//! elevation mask), visible but excluded (above the mask, not flagged for
//! precision approach), or usable (above the mask and PA flagged). Only the
//! usable set feeds the geometry; the visible count is still reported.

use crate::los::LosRecord;

/// Satellites retained for one user at one epoch.
#[derive(Debug, Clone)]
pub struct SatelliteSelection<'a> {
    /// Number of visible satellites (elevation strictly above the mask).
    pub nvs: usize,
    /// Visible satellites flagged as PA usable, in input order.
    pub usable: Vec<&'a LosRecord>,
}

impl SatelliteSelection<'_> {
    /// Number of satellites entering the PA solution (NVS-PA).
    pub fn nvs_pa(&self) -> usize {
        self.usable.len()
    }
}

/// Split one user's records against the elevation mask and the PA flag.
///
/// # Arguments
/// * `records` - LOS records of a single user within a single epoch.
/// * `mask_angle_deg` - elevation mask in degrees; a satellite exactly at the
///   mask is not visible.
pub fn select_satellites(records: &[LosRecord], mask_angle_deg: f64) -> SatelliteSelection<'_> {
    let mut nvs = 0;
    let mut usable = Vec::with_capacity(records.len());
    for record in records {
        if record.elevation <= mask_angle_deg {
            continue;
        }
        nvs += 1;
        if record.is_pa_usable() {
            usable.push(record);
        }
    }
    SatelliteSelection { nvs, usable }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::los::tests::los_line;

    fn record(flag: i32, prn: u32, elev: f64) -> LosRecord {
        los_line(0, 1, flag, prn, elev, 0.0, 0.0, 1.0).parse().unwrap()
    }

    #[test]
    fn mask_is_strict() {
        let records = vec![record(1, 1, 5.0), record(1, 2, 5.0001), record(1, 3, 4.0)];
        let sel = select_satellites(&records, 5.0);
        assert_eq!(sel.nvs, 1);
        assert_eq!(sel.nvs_pa(), 1);
        assert_eq!(sel.usable[0].prn, 2);
    }

    #[test]
    fn unflagged_satellites_count_as_visible_only() {
        let records = vec![
            record(1, 1, 30.0),
            record(0, 2, 40.0),
            record(-1, 3, 50.0),
            record(1, 4, 60.0),
            record(2, 5, 70.0),
        ];
        let sel = select_satellites(&records, 5.0);
        assert_eq!(sel.nvs, 5);
        assert_eq!(sel.nvs_pa(), 2);
        let prns: Vec<u32> = sel.usable.iter().map(|r| r.prn).collect();
        assert_eq!(prns, vec![1, 4]);
    }

    #[test]
    fn counts_are_ordered() {
        let records = vec![record(1, 1, 2.0), record(0, 2, 10.0), record(1, 3, 10.0)];
        for mask in [0.0, 5.0, 10.0, 90.0] {
            let sel = select_satellites(&records, mask);
            assert!(sel.nvs_pa() <= sel.nvs);
            assert!(sel.nvs <= records.len());
        }
    }

    #[test]
    fn empty_input() {
        let sel = select_satellites(&[], 5.0);
        assert_eq!(sel.nvs, 0);
        assert_eq!(sel.nvs_pa(), 0);
    }
}
