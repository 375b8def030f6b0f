//! Power-law-with-deadband response model.
//!
//! The fitter relies on two primitive operations:
//! - predict rpm for a throttle given `(a, b, deadband)` (for residuals/reports)
//! - fill a Jacobian row `∂rpm/∂(a, b, deadband)` (for the solver)
//!
//! Throttle equal to the deadband belongs to the zero side.

use crate::domain::CurveParams;

/// `a * (throttle - deadband)^b` above the deadband, else exactly `0`.
pub fn evaluate(throttle: f64, params: &CurveParams) -> f64 {
    if throttle <= params.deadband {
        return 0.0;
    }
    params.a * (throttle - params.deadband).powf(params.b)
}

/// [`evaluate`] over a sequence of throttles.
pub fn evaluate_many(throttles: &[f64], params: &CurveParams) -> Vec<f64> {
    throttles.iter().map(|&t| evaluate(t, params)).collect()
}

/// Fill the partial derivatives of [`evaluate`] at `throttle`.
///
/// With `x = throttle - deadband > 0`:
///
/// ```text
/// ∂/∂a        = x^b
/// ∂/∂b        = a x^b ln x
/// ∂/∂deadband = -a b x^(b-1)
/// ```
///
/// The row is all zeros inside the deadband.
pub fn fill_jacobian_row(throttle: f64, params: &CurveParams, out: &mut [f64]) {
    let x = throttle - params.deadband;
    if x <= 0.0 {
        out[0] = 0.0;
        out[1] = 0.0;
        out[2] = 0.0;
        return;
    }
    let xb = x.powf(params.b);
    out[0] = xb;
    out[1] = params.a * xb * x.ln();
    out[2] = -params.a * params.b * xb / x;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CurveParams {
        CurveParams {
            a: 5.0,
            b: 0.9,
            deadband: 15.0,
        }
    }

    #[test]
    fn zero_at_and_below_deadband() {
        let p = params();
        for t in [0.0, 5.0, 14.999, 15.0] {
            assert_eq!(evaluate(t, &p), 0.0, "throttle {t}");
        }
    }

    #[test]
    fn power_law_above_deadband() {
        let p = params();
        for t in [15.5, 20.0, 50.0, 100.0] {
            let expected = 5.0 * (t - 15.0_f64).powf(0.9);
            assert!((evaluate(t, &p) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn evaluate_many_matches_scalar() {
        let p = params();
        let ts = [10.0, 15.0, 30.0, 75.0];
        let ys = evaluate_many(&ts, &p);
        for (t, y) in ts.iter().zip(ys.iter()) {
            assert_eq!(*y, evaluate(*t, &p));
        }
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let p = params();
        let t = 42.0;
        let mut row = [0.0; 3];
        fill_jacobian_row(t, &p, &mut row);

        let h = 1e-6;
        let base = p.to_array();
        for k in 0..3 {
            let mut up = base;
            let mut dn = base;
            up[k] += h;
            dn[k] -= h;
            let fd = (evaluate(t, &CurveParams::from_slice(&up))
                - evaluate(t, &CurveParams::from_slice(&dn)))
                / (2.0 * h);
            assert!((row[k] - fd).abs() < 1e-4 * fd.abs().max(1.0), "k={k}: {} vs {fd}", row[k]);
        }
    }

    #[test]
    fn jacobian_is_zero_inside_deadband() {
        let mut row = [1.0; 3];
        fill_jacobian_row(15.0, &params(), &mut row);
        assert_eq!(row, [0.0; 3]);
    }
}
