//! Curve fitting for a single motor channel.
//!
//! Given calibration samples `(throttle_i, rpm_i)` we estimate `(a, b, deadband)`
//! of
//!
//! ```text
//! rpm = a * (throttle - deadband)^b   for throttle > deadband, else 0
//! ```
//!
//! by bounded nonlinear least squares over **all** samples. Zero-rpm samples stay
//! in the objective: they are what keeps the deadband from drifting towards 0.
//!
//! The objective has a kink wherever the deadband crosses a sample throttle (that
//! sample switches between "inside the deadband" and "on the curve"). A damped
//! solver that keeps stepping across such a kink stalls with tiny steps short of
//! the optimum. We therefore split the deadband bounds at the sample throttles,
//! run the bounded solver inside each smooth segment from the same initial guess,
//! and keep the lowest-cost segment (ties go to the lower segment). All segments
//! draw from one evaluation budget.

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};

use crate::domain::{CalibrationSample, CurveParams, FitConfig, FitQuality, FittedCurveParams, MAX_THROTTLE};
use crate::error::{ConvergenceCause, FitError};
use crate::math::{EvalBudget, LeastSquaresProblem, LmOptions, LmReport, minimize_bounded};
use crate::models::{evaluate, fill_jacobian_row};
use crate::report::evaluate_fit;

/// Residuals `rpm_i - model(throttle_i)` over a channel's samples.
struct CurveProblem {
    throttle: Vec<f64>,
    rpm: Vec<f64>,
}

impl CurveProblem {
    fn new(samples: &[CalibrationSample]) -> Self {
        Self {
            throttle: samples.iter().map(|s| f64::from(s.throttle)).collect(),
            rpm: samples.iter().map(|s| f64::from(s.rpm)).collect(),
        }
    }
}

impl LeastSquaresProblem for CurveProblem {
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let params = CurveParams::from_slice(x.as_slice());
        DVector::from_iterator(
            self.throttle.len(),
            self.throttle
                .iter()
                .zip(self.rpm.iter())
                .map(|(&t, &y)| y - evaluate(t, &params)),
        )
    }

    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let params = CurveParams::from_slice(x.as_slice());
        let n = self.throttle.len();
        let mut jac = DMatrix::<f64>::zeros(n, 3);
        let mut row = [0.0; 3];
        for (i, &t) in self.throttle.iter().enumerate() {
            fill_jacobian_row(t, &params, &mut row);
            // Residual = y - model, so its Jacobian is the negated model Jacobian.
            for j in 0..3 {
                jac[(i, j)] = -row[j];
            }
        }
        jac
    }
}

/// Starting point for the solver.
///
/// Assumes a deadband near `initial.deadband` and a sub-linear exponent, and
/// scales `a` so the curve passes near the largest observed rpm at
/// `initial.reference_throttle`. The result is projected into the bounds.
pub fn initial_guess(samples: &[CalibrationSample], config: &FitConfig) -> CurveParams {
    let max_rpm = samples.iter().map(|s| s.rpm).max().unwrap_or(0);
    let guess = CurveParams {
        a: f64::from(max_rpm) / config.initial.reference_throttle.powf(config.initial.b),
        b: config.initial.b,
        deadband: config.initial.deadband,
    };
    config.bounds.clamp(&guess)
}

/// Split `[lower, upper]` at every distinct sample throttle strictly inside it.
///
/// Within each returned segment the set of samples above the deadband is fixed,
/// so the objective is smooth there.
pub fn deadband_segments(samples: &[CalibrationSample], lower: f64, upper: f64) -> Vec<(f64, f64)> {
    let mut edges: Vec<f64> = samples
        .iter()
        .map(|s| f64::from(s.throttle))
        .filter(|&t| t > lower && t < upper)
        .collect();
    edges.sort_by(|a, b| a.total_cmp(b));
    edges.dedup();
    edges.insert(0, lower);
    edges.push(upper);
    edges.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Reject samples outside the input domain.
pub fn validate_samples(samples: &[CalibrationSample]) -> Result<(), FitError> {
    for (index, s) in samples.iter().enumerate() {
        if s.throttle > MAX_THROTTLE {
            return Err(FitError::MalformedSample {
                index,
                reason: format!("throttle {} exceeds {MAX_THROTTLE}", s.throttle),
            });
        }
    }
    Ok(())
}

/// Fit one channel.
///
/// Fails with `InsufficientData` when fewer than `config.min_nonzero_samples`
/// samples have `rpm > 0`, and with `ConvergenceFailure` when the bounded solver
/// cannot produce a solution within its evaluation budget. A returned fit always
/// lies inside `config.bounds`.
pub fn fit_channel(samples: &[CalibrationSample], config: &FitConfig) -> Result<FittedCurveParams, FitError> {
    validate_samples(samples)?;

    let nonzero = samples.iter().filter(|s| s.rpm > 0).count();
    if nonzero < config.min_nonzero_samples {
        return Err(FitError::InsufficientData {
            nonzero,
            required: config.min_nonzero_samples,
        });
    }

    config
        .bounds
        .validate()
        .map_err(ConvergenceCause::InfeasibleBounds)?;

    let guess = initial_guess(samples, config);
    debug!(
        "initial guess: a={:.6} b={:.6} deadband={:.3}",
        guess.a, guess.b, guess.deadband
    );

    let problem = CurveProblem::new(samples);
    let opts = LmOptions {
        ftol: config.ftol,
        xtol: config.xtol,
        gtol: config.gtol,
    };
    let x0 = DVector::from_row_slice(&guess.to_array());
    let mut budget = EvalBudget::new(config.max_evaluations);

    let mut best: Option<LmReport> = None;
    let mut last_failure: Option<ConvergenceCause> = None;
    let segments = deadband_segments(samples, config.bounds.lower.deadband, config.bounds.upper.deadband);
    for (lo, hi) in segments {
        let lower = DVector::from_row_slice(&[config.bounds.lower.a, config.bounds.lower.b, lo]);
        let upper = DVector::from_row_slice(&[config.bounds.upper.a, config.bounds.upper.b, hi]);

        match minimize_bounded(&problem, &x0, &lower, &upper, &opts, &mut budget) {
            Ok(report) => {
                trace!(
                    "deadband segment [{lo}, {hi}]: cost={:.6e} ({:?})",
                    report.cost, report.termination
                );
                if best.as_ref().is_none_or(|b| report.cost < b.cost) {
                    best = Some(report);
                }
            }
            Err(cause @ ConvergenceCause::BudgetExhausted { .. }) => return Err(cause.into()),
            Err(cause) => {
                trace!("deadband segment [{lo}, {hi}]: skipped ({cause})");
                last_failure = Some(cause);
            }
        }
    }

    let Some(report) = best else {
        return Err(last_failure.unwrap_or(ConvergenceCause::SingularJacobian).into());
    };
    debug!(
        "solver finished: {:?} after {} evaluations ({} total), cost={:.6e}",
        report.termination, report.evaluations, budget.used, report.cost
    );

    // The solver projects every iterate; clamp once more so rounding can never
    // leak a value past a bound.
    let params = config.bounds.clamp(&CurveParams::from_slice(report.x.as_slice()));
    if !params.to_array().iter().all(|v| v.is_finite()) {
        return Err(ConvergenceCause::NonFiniteResidual.into());
    }

    let evaluation = evaluate_fit(samples, &params);
    Ok(FittedCurveParams {
        params,
        inv_b: 1.0 / params.b,
        quality: FitQuality {
            rmse: evaluation.rmse,
            max_error: evaluation.max_error,
            n: samples.len(),
        },
        evaluations: budget.used,
        iterations: report.iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    const CHECK_THROTTLES: [u8; 7] = [10, 15, 20, 30, 50, 75, 100];

    fn synthetic(truth: &CurveParams, throttles: &[u8]) -> Vec<CalibrationSample> {
        throttles
            .iter()
            .map(|&t| CalibrationSample {
                throttle: t,
                rpm: evaluate(f64::from(t), truth).round() as u32,
            })
            .collect()
    }

    fn samples(pairs: &[(u8, u32)]) -> Vec<CalibrationSample> {
        pairs
            .iter()
            .map(|&(throttle, rpm)| CalibrationSample { throttle, rpm })
            .collect()
    }

    fn rel_err(got: f64, want: f64) -> f64 {
        ((got - want) / want).abs()
    }

    #[test]
    fn recovers_known_curve() {
        let truth = CurveParams {
            a: 5.0,
            b: 0.9,
            deadband: 15.0,
        };
        let data = synthetic(&truth, &CHECK_THROTTLES);
        let fit = fit_channel(&data, &FitConfig::default()).unwrap();

        assert!(rel_err(fit.params.a, 5.0) < 0.05, "a={}", fit.params.a);
        assert!(rel_err(fit.params.b, 0.9) < 0.05, "b={}", fit.params.b);
        assert!(rel_err(fit.params.deadband, 15.0) < 0.05, "deadband={}", fit.params.deadband);
        assert!(fit.quality.rmse < 1.0, "rmse={}", fit.quality.rmse);
        assert!((fit.inv_b - 1.0 / fit.params.b).abs() < 1e-15);
    }

    #[test]
    fn exponent_on_lower_bound_is_respected() {
        // A square-root motor: the best exponent sits exactly on b_min.
        let truth = CurveParams {
            a: 88.0,
            b: 0.5,
            deadband: 10.0,
        };
        let throttles: Vec<u8> = (0..=100).step_by(5).collect();
        let data = synthetic(&truth, &throttles);
        let config = FitConfig::default();
        let fit = fit_channel(&data, &config).unwrap();

        assert!(config.bounds.contains(&fit.params));
        assert!(rel_err(fit.params.a, 88.0) < 0.01);
        assert!((fit.params.b - 0.5).abs() < 1e-3);
        assert!((fit.params.deadband - 10.0).abs() < 0.1);
    }

    #[test]
    fn noisy_data_stays_within_bounds() {
        let truth = CurveParams {
            a: 6.0,
            b: 0.85,
            deadband: 12.0,
        };
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 5.0).unwrap();
        let data: Vec<CalibrationSample> = (0..=100)
            .step_by(5)
            .map(|t: u8| {
                let rpm = evaluate(f64::from(t), &truth) + noise.sample(&mut rng);
                CalibrationSample {
                    throttle: t,
                    rpm: rpm.round().max(0.0) as u32,
                }
            })
            .collect();

        let config = FitConfig::default();
        let fit = fit_channel(&data, &config).unwrap();
        assert!(config.bounds.contains(&fit.params));
        assert!(fit.quality.rmse < 10.0, "rmse={}", fit.quality.rmse);
        assert!(fit.quality.max_error >= fit.quality.rmse);
    }

    #[test]
    fn fitting_is_deterministic() {
        let data = samples(&[(0, 0), (10, 0), (20, 120), (40, 260), (60, 370), (80, 460), (100, 540)]);
        let config = FitConfig::default();
        let first = fit_channel(&data, &config).unwrap();
        let second = fit_channel(&data, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn too_few_nonzero_samples() {
        let data = samples(&[(10, 0), (20, 100), (30, 150), (40, 0)]);
        let err = fit_channel(&data, &FitConfig::default()).unwrap_err();
        assert_eq!(err, FitError::InsufficientData { nonzero: 2, required: 3 });
    }

    #[test]
    fn deadband_on_a_sample_throttle_is_found() {
        // The true deadband coincides with the 10% sample, the kink of the objective.
        let truth = CurveParams {
            a: 88.0,
            b: 0.5,
            deadband: 10.0,
        };
        let throttles: Vec<u8> = (0..=100).step_by(10).collect();
        let fit = fit_channel(&synthetic(&truth, &throttles), &FitConfig::default()).unwrap();
        assert!(rel_err(fit.params.a, 88.0) < 0.01, "a={}", fit.params.a);
        assert!((fit.params.deadband - 10.0).abs() < 0.1, "deadband={}", fit.params.deadband);
        assert!(fit.quality.rmse < 1.0, "rmse={}", fit.quality.rmse);
    }

    #[test]
    fn response_below_initial_deadband_is_still_fitted() {
        let data = samples(&[(5, 10), (8, 20), (12, 30)]);
        let fit = fit_channel(&data, &FitConfig::default()).unwrap();
        assert!(fit.params.deadband < 5.0);
        assert!(fit.quality.max_error < 1.0);
    }

    #[test]
    fn no_sample_above_deadband_range_is_singular() {
        let data = samples(&[(5, 10), (8, 20), (12, 30)]);
        let mut config = FitConfig::default();
        config.bounds.lower.deadband = 20.0;
        let err = fit_channel(&data, &config).unwrap_err();
        assert_eq!(err, FitError::ConvergenceFailure(ConvergenceCause::SingularJacobian));
    }

    #[test]
    fn segments_split_at_sample_throttles() {
        let data = samples(&[(0, 0), (10, 0), (10, 0), (20, 50), (30, 90)]);
        let segs = deadband_segments(&data, 0.0, 25.0);
        assert_eq!(segs, vec![(0.0, 10.0), (10.0, 20.0), (20.0, 25.0)]);
        assert_eq!(deadband_segments(&data, 12.0, 12.0), vec![(12.0, 12.0)]);
    }

    #[test]
    fn exhausted_budget_is_a_convergence_failure() {
        let truth = CurveParams {
            a: 5.0,
            b: 0.9,
            deadband: 15.0,
        };
        let data = synthetic(&truth, &CHECK_THROTTLES);
        let config = FitConfig {
            max_evaluations: 2,
            ..FitConfig::default()
        };
        let err = fit_channel(&data, &config).unwrap_err();
        assert!(matches!(
            err,
            FitError::ConvergenceFailure(ConvergenceCause::BudgetExhausted { .. })
        ));
    }

    #[test]
    fn infeasible_bounds_fail_before_solving() {
        let data = samples(&[(20, 100), (40, 200), (60, 300)]);
        let mut config = FitConfig::default();
        config.bounds.lower.b = 2.0;
        let err = fit_channel(&data, &config).unwrap_err();
        assert!(matches!(
            err,
            FitError::ConvergenceFailure(ConvergenceCause::InfeasibleBounds(_))
        ));
    }

    #[test]
    fn out_of_range_throttle_is_malformed() {
        let data = samples(&[(20, 100), (40, 200), (160, 300)]);
        let err = fit_channel(&data, &FitConfig::default()).unwrap_err();
        assert!(matches!(err, FitError::MalformedSample { index: 2, .. }));
    }

    #[test]
    fn initial_guess_is_projected_into_bounds() {
        let config = FitConfig::default();
        let huge = samples(&[(100, 4_000_000_000)]);
        assert_eq!(initial_guess(&huge, &config).a, config.bounds.upper.a);

        let data = samples(&[(100, 800)]);
        let guess = initial_guess(&data, &config);
        assert!((guess.a - 800.0 / 80f64.powf(0.8)).abs() < 1e-12);
        assert_eq!(guess.b, 0.8);
        assert_eq!(guess.deadband, 15.0);
    }
}
