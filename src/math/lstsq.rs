//! Dense least-squares solve.
//!
//! The solver repeatedly needs the step `δ` of a tiny damped system
//!
//! ```text
//! (JᵀJ + λ D) δ = Jᵀr
//! ```
//!
//! with at most three unknowns. We use SVD so that rank-deficient systems (for
//! example a Jacobian column that is all zeros) are detected instead of
//! producing garbage.

use nalgebra::{DMatrix, DVector};

/// Solve `x β ≈ y` in the least-squares sense using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly or the
/// solution is not finite.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.nrows() == 0 || x.ncols() == 0 || x.nrows() != y.len() {
        return None;
    }
    let svd = x.clone().svd(true, true);

    // A square damped system is singular exactly when its largest singular value
    // is zero; scale the cutoff to the matrix so large-rpm problems behave like
    // small ones.
    let max_sv = svd.singular_values.max();
    if !(max_sv.is_finite() && max_sv > 0.0) {
        return None;
    }
    let eps = max_sv * 1e-14;

    let beta = svd.solve(y, eps).ok()?;
    if beta.iter().all(|v| v.is_finite()) {
        Some(beta)
    } else {
        None
    }
}
