//! Linear algebra helpers for the weighted least-squares solution.
//!
//! Public API:
//!     pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64>
//!     pub fn pseudo_inverse(m: &DMatrix<f64>) -> Result<DMatrix<f64>>
//!     pub fn normal_matrix(g: &DMatrix<f64>, w: &DMatrix<f64>) -> DMatrix<f64>
//!
//! Strategy for the pseudo-inverse:
//! 1) SVD  M = U Σ Vᵀ
//! 2) Cutoff ε = PINV_RCOND · max(σ)
//! 3) M⁺ = V Σ⁺ Uᵀ with σ⁺ = 1/σ for σ > ε, 0 otherwise
//!
//! The relative cutoff keeps near-singular normal matrices (satellites nearly
//! collinear, all at the same elevation, ...) solvable instead of failing.

use nalgebra::DMatrix;
use nalgebra::linalg::SVD;

use crate::error::{Result, UsrError};

/// Relative singular value cutoff of [`pseudo_inverse`].
pub const PINV_RCOND: f64 = 1e-15;

/// Iteration cap of the SVD; a 4 x 4 normal matrix converges in a handful.
pub const SVD_MAX_ITERATIONS: usize = 1000;

/// Symmetrize a matrix: P ← 0.5 (P + Pᵀ)
///
/// Simple matrix symmetrization function that reduces round-off errors associated
/// with floating point arithmetic.
#[inline]
pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    0.5 * (m + m.transpose())
}

/// Moore-Penrose pseudo-inverse through the singular value decomposition.
///
/// Singular values at or below `PINV_RCOND` times the largest one are treated
/// as zero. An empty matrix yields an empty (transposed) matrix.
///
/// # Errors
/// [`UsrError::Numerical`] if the matrix holds a non-finite entry, the
/// decomposition does not converge within [`SVD_MAX_ITERATIONS`], or it
/// cannot provide its singular vectors.
pub fn pseudo_inverse(m: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if m.is_empty() {
        return Ok(DMatrix::zeros(m.ncols(), m.nrows()));
    }
    if m.iter().any(|x| !x.is_finite()) {
        return Err(UsrError::Numerical("non-finite entry in matrix to invert"));
    }
    let svd = SVD::try_new(m.clone(), true, true, f64::EPSILON, SVD_MAX_ITERATIONS)
        .ok_or(UsrError::Numerical("SVD did not converge"))?;
    let max_sv = svd.singular_values.max();
    let eps = if max_sv.is_finite() { PINV_RCOND * max_sv } else { 0.0 };
    svd.pseudo_inverse(eps).map_err(UsrError::Numerical)
}

/// Weighted normal matrix `Gᵀ W G`.
pub fn normal_matrix(g: &DMatrix<f64>, w: &DMatrix<f64>) -> DMatrix<f64> {
    g.transpose() * w * g
}

/* =============================== Tests ==================================== */

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: &DMatrix<f64>, b: &DMatrix<f64>, tol: f64) -> bool {
        if a.shape() != b.shape() {
            return false;
        }
        let mut max_abs = 0.0f64;
        for i in 0..a.nrows() {
            for j in 0..a.ncols() {
                max_abs = max_abs.max((a[(i, j)] - b[(i, j)]).abs());
            }
        }
        max_abs <= tol
    }

    #[test]
    fn t_symmetrize() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 3.0]);
        let s = symmetrize(&m);
        let s_expected = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 3.0]);
        assert!(approx_eq(&s, &s_expected, 1e-15));
    }

    #[test]
    fn t_pinv_matches_inverse_when_regular() {
        let a = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.5, 1.0, 3.0, 0.2, 0.5, 0.2, 2.0]);
        let pinv = pseudo_inverse(&a).unwrap();
        let inv = a.clone().try_inverse().unwrap();
        assert!(approx_eq(&pinv, &inv, 1e-12));
    }

    #[test]
    fn t_pinv_singular() {
        // Rank one: the pseudo-inverse exists, the inverse does not.
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert!(a.clone().try_inverse().is_none());
        let pinv = pseudo_inverse(&a).unwrap();
        let expected = DMatrix::from_row_slice(2, 2, &[0.25, 0.25, 0.25, 0.25]);
        assert!(approx_eq(&pinv, &expected, 1e-12));
        // Penrose condition A A⁺ A = A
        assert!(approx_eq(&(&a * &pinv * &a), &a, 1e-12));
    }

    #[test]
    fn t_pinv_rectangular() {
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        let pinv = pseudo_inverse(&a).unwrap();
        assert_eq!(pinv.shape(), (2, 3));
        assert!(approx_eq(&(&pinv * &a), &DMatrix::identity(2, 2), 1e-12));
    }

    #[test]
    fn t_pinv_empty() {
        let a = DMatrix::<f64>::zeros(0, 4);
        let pinv = pseudo_inverse(&a).unwrap();
        assert_eq!(pinv.shape(), (4, 0));
    }

    #[test]
    fn t_normal_matrix_identity_weights() {
        let g = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let w = DMatrix::<f64>::identity(2, 2);
        let n = normal_matrix(&g, &w);
        assert!(approx_eq(&n, &(g.transpose() * &g), 1e-15));
        assert!(approx_eq(&n, &symmetrize(&n), 1e-15));
    }

    #[test]
    fn t_pinv_non_finite_fails_fast() {
        let a = DMatrix::from_row_slice(2, 2, &[f64::NAN, 0.0, 0.0, 1.0]);
        assert!(matches!(pseudo_inverse(&a), Err(UsrError::Numerical(_))));
        let b = DMatrix::from_row_slice(2, 2, &[f64::INFINITY, 0.0, 0.0, 1.0]);
        assert!(pseudo_inverse(&b).is_err());
    }
}
