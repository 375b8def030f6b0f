//! Fit evaluation and formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

pub mod format;

pub use format::*;

use crate::domain::{CalibrationSample, CurveParams};
use crate::models::evaluate;

/// Reference throttles reported for every channel.
pub const CHECKPOINT_THROTTLES: [u8; 7] = [10, 15, 20, 30, 50, 75, 100];

/// Model prediction at one reference throttle, compared against the data.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub throttle: u8,
    pub predicted: f64,
    /// First sample recorded at exactly this throttle, if any.
    pub actual: Option<u32>,
}

impl Checkpoint {
    /// `predicted - actual`, when there is an actual value.
    pub fn error(&self) -> Option<f64> {
        self.actual.map(|a| self.predicted - f64::from(a))
    }
}

/// Residual statistics plus the checkpoint table.
#[derive(Debug, Clone, PartialEq)]
pub struct FitEvaluation {
    pub rmse: f64,
    pub max_error: f64,
    pub checkpoints: Vec<Checkpoint>,
}

/// Evaluate `params` against `samples`.
///
/// `rmse` and `max_error` are taken over every sample. An empty sample list
/// yields zeros.
pub fn evaluate_fit(samples: &[CalibrationSample], params: &CurveParams) -> FitEvaluation {
    let mut sse = 0.0;
    let mut max_error: f64 = 0.0;
    for s in samples {
        let residual = f64::from(s.rpm) - evaluate(f64::from(s.throttle), params);
        sse += residual * residual;
        max_error = max_error.max(residual.abs());
    }
    let rmse = if samples.is_empty() {
        0.0
    } else {
        (sse / samples.len() as f64).sqrt()
    };

    FitEvaluation {
        rmse,
        max_error,
        checkpoints: checkpoints(samples, params),
    }
}

/// Predicted vs. observed rpm at [`CHECKPOINT_THROTTLES`].
pub fn checkpoints(samples: &[CalibrationSample], params: &CurveParams) -> Vec<Checkpoint> {
    CHECKPOINT_THROTTLES
        .iter()
        .map(|&throttle| Checkpoint {
            throttle,
            predicted: evaluate(f64::from(throttle), params),
            actual: samples.iter().find(|s| s.throttle == throttle).map(|s| s.rpm),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CurveParams {
        CurveParams {
            a: 5.0,
            b: 1.0,
            deadband: 10.0,
        }
    }

    fn samples(pairs: &[(u8, u32)]) -> Vec<CalibrationSample> {
        pairs
            .iter()
            .map(|&(throttle, rpm)| CalibrationSample { throttle, rpm })
            .collect()
    }

    #[test]
    fn rmse_and_max_error_over_all_samples() {
        // Model: 0, 50, 100 at throttles 10, 20, 30. Residuals: 0, 3, -4.
        let data = samples(&[(10, 0), (20, 53), (30, 96)]);
        let eval = evaluate_fit(&data, &params());
        assert!((eval.rmse - (25.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(eval.max_error, 4.0);
        assert!(eval.max_error >= eval.rmse);
    }

    #[test]
    fn max_error_is_the_true_maximum() {
        let data = samples(&[(5, 7), (20, 50), (40, 130), (60, 249)]);
        let eval = evaluate_fit(&data, &params());
        let worst = data
            .iter()
            .map(|s| (f64::from(s.rpm) - evaluate(f64::from(s.throttle), &params())).abs())
            .fold(0.0, f64::max);
        assert_eq!(eval.max_error, worst);
    }

    #[test]
    fn checkpoints_mark_missing_data() {
        let data = samples(&[(10, 0), (20, 48), (20, 99), (50, 210)]);
        let cps = checkpoints(&data, &params());
        assert_eq!(cps.len(), CHECKPOINT_THROTTLES.len());

        let at = |t: u8| cps.iter().find(|c| c.throttle == t).unwrap();
        assert_eq!(at(10).actual, Some(0));
        assert_eq!(at(10).error(), Some(0.0));
        // First sample at a throttle wins.
        assert_eq!(at(20).actual, Some(48));
        assert_eq!(at(20).error(), Some(2.0));
        assert_eq!(at(50).error(), Some(-10.0));
        assert_eq!(at(15).actual, None);
        assert_eq!(at(15).error(), None);
        assert_eq!(at(100).predicted, 450.0);
    }

    #[test]
    fn empty_samples_give_zero_metrics() {
        let eval = evaluate_fit(&[], &params());
        assert_eq!(eval.rmse, 0.0);
        assert_eq!(eval.max_error, 0.0);
        assert!(eval.checkpoints.iter().all(|c| c.actual.is_none()));
    }
}
