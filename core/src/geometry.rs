//! Geometry and weighting matrices of the user position solution.
//!
//! For `n` usable satellites the geometry matrix `G` is `n x 4` in the local
//! East-North-Up frame plus a receiver clock column:
//!
//! $$
//! G_i = \begin{bmatrix} -\cos(el_i)\sin(az_i) & -\cos(el_i)\cos(az_i) & -\sin(el_i) & 1 \end{bmatrix}
//! $$
//!
//! and the weighting matrix is `W = diag(1 / \sigma_{UERE,i}^2)`. The range
//! error vector carries the total error each satellite contributes. Rows of
//! all three stay aligned by position.

use nalgebra::{DMatrix, DVector};

use crate::config::ErrorBudget;
use crate::error::{Result, UsrError};
use crate::los::LosRecord;

/// Number of unknowns: East, North, Up and receiver clock.
pub const STATE_DIM: usize = 4;

/// Total range error of one satellite in meters.
pub fn range_error(record: &LosRecord, budget: ErrorBudget) -> f64 {
    match budget {
        ErrorBudget::Logged => record.range_error,
        ErrorBudget::Components => {
            record.sreu + record.uisde + record.tropo_error + record.air_error
        }
    }
}

/// UERE variance of one satellite in m².
///
/// The component form is the MOPS budget
/// `σ²_flt + σ²_UIRE + σ²_tropo + σ²_air`.
pub fn sigma_uere2(record: &LosRecord, budget: ErrorBudget) -> f64 {
    match budget {
        ErrorBudget::Logged => record.uere.powi(2),
        ErrorBudget::Components => {
            record.sigma_flt.powi(2)
                + record.uire.powi(2)
                + record.sigma_tropo.powi(2)
                + record.sigma_air.powi(2)
        }
    }
}

/// Geometry, weighting and range errors for one user-epoch.
#[derive(Debug, Clone)]
pub struct Geometry {
    /// `n x 4` geometry matrix.
    pub g: DMatrix<f64>,
    /// `n x n` diagonal weighting matrix.
    pub w: DMatrix<f64>,
    /// Range error of each satellite (meters).
    pub range_errors: DVector<f64>,
}

impl Geometry {
    /// Build the matrices from the usable satellites of one user.
    ///
    /// With no satellites the result is an empty `0 x 4` geometry and a `0 x 0`
    /// weighting matrix; it must not be solved.
    ///
    /// # Errors
    /// [`UsrError::InvalidRecord`] when a satellite has a non-finite
    /// direction or range error, or a UERE variance that is not strictly
    /// positive and finite.
    pub fn build(satellites: &[&LosRecord], budget: ErrorBudget) -> Result<Self> {
        let n = satellites.len();
        let mut g = DMatrix::<f64>::zeros(n, STATE_DIM);
        let mut weights = DVector::<f64>::zeros(n);
        let mut range_errors = DVector::<f64>::zeros(n);
        for (i, sat) in satellites.iter().enumerate() {
            let invalid = |reason| UsrError::InvalidRecord {
                sod: sat.sod,
                user_id: sat.user_id,
                prn: sat.prn,
                reason,
            };
            if !(sat.elevation.is_finite() && sat.azimuth.is_finite()) {
                return Err(invalid("non-finite elevation or azimuth"));
            }
            let variance = sigma_uere2(sat, budget);
            if !(variance > 0.0 && variance.is_finite()) {
                return Err(invalid("UERE variance is not strictly positive"));
            }
            let error = range_error(sat, budget);
            if !error.is_finite() {
                return Err(invalid("non-finite range error"));
            }
            let (sin_el, cos_el) = sat.elevation.to_radians().sin_cos();
            let (sin_az, cos_az) = sat.azimuth.to_radians().sin_cos();
            g[(i, 0)] = -cos_el * sin_az;
            g[(i, 1)] = -cos_el * cos_az;
            g[(i, 2)] = -sin_el;
            g[(i, 3)] = 1.0;
            weights[i] = 1.0 / variance;
            range_errors[i] = error;
        }
        Ok(Geometry {
            g,
            w: DMatrix::from_diagonal(&weights),
            range_errors,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.g.nrows() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::los::tests::los_line;
    use assert_approx_eq::assert_approx_eq;

    fn record(prn: u32, elev: f64, azim: f64, rerror: f64, uere: f64) -> LosRecord {
        los_line(0, 1, 1, prn, elev, azim, rerror, uere).parse().unwrap()
    }

    #[test]
    fn rows_follow_elevation_and_azimuth() {
        let recs = vec![
            record(1, 90.0, 0.0, 0.0, 1.0),
            record(2, 0.0, 90.0, 0.0, 1.0),
            record(3, 0.0, 0.0, 0.0, 1.0),
        ];
        let refs: Vec<&LosRecord> = recs.iter().collect();
        let geom = Geometry::build(&refs, ErrorBudget::Logged).unwrap();
        assert_eq!(geom.g.shape(), (3, 4));
        // Zenith satellite: only the up component.
        assert_approx_eq!(geom.g[(0, 0)], 0.0, 1e-12);
        assert_approx_eq!(geom.g[(0, 1)], 0.0, 1e-12);
        assert_approx_eq!(geom.g[(0, 2)], -1.0, 1e-12);
        // Horizon, due east.
        assert_approx_eq!(geom.g[(1, 0)], -1.0, 1e-12);
        assert_approx_eq!(geom.g[(1, 1)], 0.0, 1e-12);
        // Horizon, due north.
        assert_approx_eq!(geom.g[(2, 1)], -1.0, 1e-12);
        for i in 0..3 {
            assert_eq!(geom.g[(i, 3)], 1.0);
        }
    }

    #[test]
    fn weights_are_inverse_variances() {
        let recs = vec![record(1, 30.0, 0.0, 1.5, 2.0), record(1, 40.0, 10.0, -0.5, 0.5)];
        let refs: Vec<&LosRecord> = recs.iter().collect();
        let geom = Geometry::build(&refs, ErrorBudget::Logged).unwrap();
        assert_eq!(geom.w.shape(), (2, 2));
        assert_approx_eq!(geom.w[(0, 0)], 0.25, 1e-15);
        assert_approx_eq!(geom.w[(1, 1)], 4.0, 1e-15);
        assert_eq!(geom.w[(0, 1)], 0.0);
        // Same PRN twice keeps both weights, attached by row.
        assert_eq!(geom.range_errors.as_slice(), &[1.5, -0.5]);
    }

    #[test]
    fn component_budget() {
        let rec = record(1, 30.0, 0.0, 99.0, 99.0);
        // sreu 0.1, uisde 0.7, tropo 0.3, air 0.5
        assert_approx_eq!(range_error(&rec, ErrorBudget::Components), 1.6, 1e-12);
        // sflt 0.2, uire 0.8, sigma tropo 0.4, sigma air 0.6
        assert_approx_eq!(
            sigma_uere2(&rec, ErrorBudget::Components),
            0.04 + 0.64 + 0.16 + 0.36,
            1e-12
        );
        assert_eq!(range_error(&rec, ErrorBudget::Logged), 99.0);
        assert_eq!(sigma_uere2(&rec, ErrorBudget::Logged), 9801.0);
    }

    #[test]
    fn empty_geometry() {
        let geom = Geometry::build(&[], ErrorBudget::Logged).unwrap();
        assert!(geom.is_empty());
        assert_eq!(geom.g.shape(), (0, 4));
        assert_eq!(geom.w.shape(), (0, 0));
        assert_eq!(geom.range_errors.len(), 0);
    }

    #[test]
    fn zero_uere_is_rejected() {
        let recs = vec![record(1, 30.0, 0.0, 1.0, 0.0), record(2, 40.0, 90.0, 1.0, 1.0)];
        let refs: Vec<&LosRecord> = recs.iter().collect();
        let err = Geometry::build(&refs, ErrorBudget::Logged).unwrap_err();
        assert!(matches!(err, UsrError::InvalidRecord { prn: 1, .. }));
    }

    #[test]
    fn non_finite_inputs_are_rejected() {
        for rec in [
            record(3, 30.0, 0.0, f64::NAN, 1.0),
            record(3, 30.0, 0.0, 1.0, f64::INFINITY),
            record(3, f64::NAN, 0.0, 1.0, 1.0),
        ] {
            assert!(Geometry::build(&[&rec], ErrorBudget::Logged).is_err());
        }
    }
}
