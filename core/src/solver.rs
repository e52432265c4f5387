//! Weighted least-squares position error solution and dilution of precision.
//!
//! The engine never estimates an absolute position: the LOS log already holds
//! the error each satellite contributes, so the weighted least-squares
//! projection of those range errors *is* the position error
//!
//! $$
//! \Delta x = (G^T W G)^{+} G^T W \varepsilon
//! $$
//!
//! whose first three components are the East, North and Up errors. DOPs are
//! computed separately from the unweighted `(GᵀG)⁻¹`.

use log::trace;
use nalgebra::DMatrix;

use crate::error::{Result, UsrError};
use crate::geometry::{Geometry, STATE_DIM};
use crate::linalg::{normal_matrix, pseudo_inverse, symmetrize};

/// Minimum number of satellites for a position solution.
pub const MIN_SATELLITES: usize = STATE_DIM;

/// Geometry-only error amplification factors.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DilutionOfPrecision {
    pub pdop: f64,
    pub hdop: f64,
    pub vdop: f64,
}

impl DilutionOfPrecision {
    /// DOPs from the diagonal of `(GᵀG)⁻¹`.
    ///
    /// A singular `GᵀG` (or one whose inverse has a negative diagonal from
    /// round-off) gives infinite DOPs, which any PDOP threshold then rejects.
    pub fn from_geometry(g: &DMatrix<f64>) -> Self {
        let gtg = g.transpose() * g;
        let q = match gtg.try_inverse() {
            Some(q) if (0..3).all(|i| q[(i, i)] >= 0.0) => q,
            _ => {
                return DilutionOfPrecision {
                    pdop: f64::INFINITY,
                    hdop: f64::INFINITY,
                    vdop: f64::INFINITY,
                };
            }
        };
        let q_east = q[(0, 0)].sqrt();
        let q_north = q[(1, 1)].sqrt();
        let q_up = q[(2, 2)].sqrt();
        DilutionOfPrecision {
            pdop: (q_east.powi(2) + q_north.powi(2) + q_up.powi(2)).sqrt(),
            hdop: (q_east.powi(2) + q_north.powi(2)).sqrt(),
            vdop: q_up,
        }
    }
}

/// East/North/Up position error of a solution (meters).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionError {
    pub east: f64,
    pub north: f64,
    pub up: f64,
}

impl PositionError {
    /// Horizontal position error.
    pub fn hpe(&self) -> f64 {
        (self.east.powi(2) + self.north.powi(2)).sqrt()
    }

    /// Vertical position error.
    pub fn vpe(&self) -> f64 {
        self.up.abs()
    }
}

/// Outcome of a weighted least-squares solve.
#[derive(Debug, Clone)]
pub struct WlsSolution {
    pub error: PositionError,
    /// `pinv(GᵀWG)`, the position covariance used for the protection levels.
    pub covariance: DMatrix<f64>,
}

/// Solve the weighted position error of a non-empty geometry.
///
/// # Errors
/// [`UsrError::Numerical`] for an empty geometry; otherwise propagates a
/// failure of the pseudo-inverse.
pub fn solve_position_error(geometry: &Geometry) -> Result<WlsSolution> {
    if geometry.is_empty() {
        return Err(UsrError::Numerical("no satellites to solve with"));
    }
    let Geometry { g, w, range_errors } = geometry;
    let covariance = pseudo_inverse(&symmetrize(&normal_matrix(g, w)))?;
    let dx = &covariance * g.transpose() * w * range_errors;
    trace!("WLS state correction: {:?}", dx.as_slice());
    Ok(WlsSolution {
        error: PositionError {
            east: dx[0],
            north: dx[1],
            up: dx[2],
        },
        covariance,
    })
}
