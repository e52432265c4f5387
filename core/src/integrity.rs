//! Protection levels and safety indices for precision approach.
//!
//! Protection levels follow MOPS DO-229 Appendix J. From the position
//! covariance `D = (GᵀWG)⁺`:
//!
//! $$
//! d_{major} = \sqrt{\frac{d_E^2 + d_N^2}{2} + \sqrt{\left(\frac{d_E^2 - d_N^2}{2}\right)^2 + d_{EN}^2}}
//! $$
//!
//! $$
//! HPL = K_{H,PA} \, d_{major} \qquad VPL = K_{V,PA} \, d_U
//! $$
//!
//! The safety index is the ratio of the actual position error to its bound;
//! a value above one is a potential integrity failure.

use nalgebra::DMatrix;

/// Horizontal protection level multiplier for precision approach.
pub const K_H_PA: f64 = 6.0;
/// Vertical protection level multiplier for precision approach.
pub const K_V_PA: f64 = 5.33;

/// Horizontal and vertical protection levels (meters).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProtectionLevels {
    pub hpl: f64,
    pub vpl: f64,
}

impl ProtectionLevels {
    /// Compute HPL/VPL from the `4 x 4` position covariance.
    pub fn from_covariance(d: &DMatrix<f64>) -> Self {
        let d_east2 = d[(0, 0)];
        let d_north2 = d[(1, 1)];
        let d_en = d[(1, 0)];
        let d_up = d[(2, 2)].sqrt();
        let d_major = ((d_east2 + d_north2) / 2.0
            + (((d_east2 - d_north2) / 2.0).powi(2) + d_en.powi(2)).sqrt())
        .sqrt();
        ProtectionLevels {
            hpl: K_H_PA * d_major,
            vpl: K_V_PA * d_up,
        }
    }
}

/// Position error over protection level.
///
/// A protection level of exactly zero yields `+inf` instead of a division
/// error; callers track it like any other maximum.
pub fn safety_index(position_error: f64, protection_level: f64) -> f64 {
    if protection_level == 0.0 {
        f64::INFINITY
    } else {
        position_error / protection_level
    }
}
