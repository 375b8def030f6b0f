//! Shared domain types.
//!
//! These types are intentionally kept small and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON and the firmware parameter artifact
//! - reloaded later for inverse-mapping checks

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Highest valid throttle percentage.
pub const MAX_THROTTLE: u8 = 100;

/// One calibration reading: commanded throttle and measured wheel speed.
///
/// Non-negativity is carried by the field types; the `throttle <= 100` domain is
/// checked by [`CalibrationSample::try_new`] and again by the fitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationSample {
    /// Throttle in percent, `0..=100`.
    pub throttle: u8,
    /// Measured rpm.
    pub rpm: u32,
}

impl CalibrationSample {
    /// Build a sample from raw integers, rejecting out-of-domain values.
    ///
    /// `index` is only used to locate the offending row in the error.
    pub fn try_new(index: usize, throttle: i64, rpm: i64) -> Result<Self, FitError> {
        if !(0..=i64::from(MAX_THROTTLE)).contains(&throttle) {
            return Err(FitError::MalformedSample {
                index,
                reason: format!("throttle {throttle} outside 0..=100"),
            });
        }
        let rpm = u32::try_from(rpm).map_err(|_| FitError::MalformedSample {
            index,
            reason: format!("rpm {rpm} is negative or too large"),
        })?;
        Ok(Self {
            throttle: throttle as u8,
            rpm,
        })
    }
}

/// Which drive motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn display_name(self) -> &'static str {
        match self {
            Side::Left => "Left",
            Side::Right => "Right",
        }
    }
}

/// Which way the motor turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn display_name(self) -> &'static str {
        match self {
            Direction::Forward => "Forward",
            Direction::Reverse => "Reverse",
        }
    }
}

/// One independently calibrated motor response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MotorChannel {
    pub side: Side,
    pub direction: Direction,
}

impl MotorChannel {
    pub const LEFT_FORWARD: Self = Self::new(Side::Left, Direction::Forward);
    pub const RIGHT_FORWARD: Self = Self::new(Side::Right, Direction::Forward);
    pub const LEFT_REVERSE: Self = Self::new(Side::Left, Direction::Reverse);
    pub const RIGHT_REVERSE: Self = Self::new(Side::Right, Direction::Reverse);

    /// All channels in artifact order.
    pub const ALL: [Self; 4] = [
        Self::LEFT_FORWARD,
        Self::RIGHT_FORWARD,
        Self::LEFT_REVERSE,
        Self::RIGHT_REVERSE,
    ];

    pub const fn new(side: Side, direction: Direction) -> Self {
        Self { side, direction }
    }

    /// Human-readable label, e.g. `Left Forward`.
    pub fn display_name(self) -> String {
        format!("{} {}", self.side.display_name(), self.direction.display_name())
    }

    /// Identifier used in the firmware artifact, e.g. `LEFT_FORWARD_CURVE`.
    pub fn symbol_name(self) -> String {
        format!(
            "{}_{}_CURVE",
            self.side.display_name().to_uppercase(),
            self.direction.display_name().to_uppercase()
        )
    }
}

/// Parameters of `rpm = a * (throttle - deadband)^b`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveParams {
    /// Scale.
    pub a: f64,
    /// Exponent.
    pub b: f64,
    /// Throttle percent at or below which the motor does not turn.
    pub deadband: f64,
}

impl CurveParams {
    pub fn to_array(self) -> [f64; 3] {
        [self.a, self.b, self.deadband]
    }

    pub fn from_slice(values: &[f64]) -> Self {
        Self {
            a: values[0],
            b: values[1],
            deadband: values[2],
        }
    }
}

/// Box constraints on the curve parameters.
///
/// The defaults are tuned to small brushless drive motors behind hobby ESCs;
/// other motor classes may need different limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    pub lower: CurveParams,
    pub upper: CurveParams,
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self {
            lower: CurveParams {
                a: 0.1,
                b: 0.5,
                deadband: 0.0,
            },
            upper: CurveParams {
                a: 1000.0,
                b: 1.5,
                deadband: 25.0,
            },
        }
    }
}

impl ParamBounds {
    /// Check the box is usable: finite, ordered, and `a`/`b` strictly positive.
    pub fn validate(&self) -> Result<(), String> {
        let lo = self.lower.to_array();
        let hi = self.upper.to_array();
        for (name, (l, h)) in ["a", "b", "deadband"].iter().zip(lo.iter().zip(hi.iter())) {
            if !(l.is_finite() && h.is_finite()) {
                return Err(format!("{name} bounds must be finite"));
            }
            if l > h {
                return Err(format!("{name} lower bound {l} exceeds upper bound {h}"));
            }
        }
        if self.lower.a <= 0.0 || self.lower.b <= 0.0 {
            return Err("a and b lower bounds must be > 0".to_string());
        }
        Ok(())
    }

    pub fn contains(&self, p: &CurveParams) -> bool {
        let lo = self.lower.to_array();
        let hi = self.upper.to_array();
        p.to_array()
            .iter()
            .zip(lo.iter().zip(hi.iter()))
            .all(|(v, (l, h))| v >= l && v <= h)
    }

    pub fn clamp(&self, p: &CurveParams) -> CurveParams {
        CurveParams {
            a: p.a.clamp(self.lower.a, self.upper.a),
            b: p.b.clamp(self.lower.b, self.upper.b),
            deadband: p.deadband.clamp(self.lower.deadband, self.upper.deadband),
        }
    }
}

/// Fit quality diagnostics (over all samples, zero-rpm ones included).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub rmse: f64,
    pub max_error: f64,
    pub n: usize,
}

/// A successful, bounds-respecting fit for one channel.
///
/// Only the fitter builds these from samples; consumers read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedCurveParams {
    pub params: CurveParams,
    /// `1 / b`, precomputed for the inverse mapping.
    pub inv_b: f64,
    pub quality: FitQuality,
    /// Residual evaluations the solver spent.
    pub evaluations: usize,
    /// Accepted solver steps.
    pub iterations: usize,
}

/// Initial guess construction for the fitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialGuess {
    pub b: f64,
    pub deadband: f64,
    /// `a0 = max(rpm) / reference_throttle^b`.
    pub reference_throttle: f64,
}

impl Default for InitialGuess {
    fn default() -> Self {
        Self {
            b: 0.8,
            deadband: 15.0,
            reference_throttle: 80.0,
        }
    }
}

/// Fitter configuration.
///
/// Derived from CLI flags (plus defaults).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitConfig {
    pub bounds: ParamBounds,
    pub initial: InitialGuess,
    /// Minimum number of samples with `rpm > 0`.
    pub min_nonzero_samples: usize,
    /// Hard cap on residual evaluations.
    pub max_evaluations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            bounds: ParamBounds::default(),
            initial: InitialGuess::default(),
            min_nonzero_samples: 3,
            max_evaluations: 10_000,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-10,
        }
    }
}

/// Calibration samples keyed by channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelSamples {
    pub channels: BTreeMap<MotorChannel, Vec<CalibrationSample>>,
}

impl ChannelSamples {
    pub fn insert(&mut self, channel: MotorChannel, samples: Vec<CalibrationSample>) {
        self.channels.insert(channel, samples);
    }

    pub fn get(&self, channel: MotorChannel) -> Option<&[CalibrationSample]> {
        self.channels.get(&channel).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Per-channel fit outcome.
pub type ChannelResult = Result<FittedCurveParams, FitError>;

/// Fit outcomes keyed by channel.
///
/// A channel missing from the map had no input at all; a channel present with an
/// `Err` had input that could not be fitted. Both mean "no parameters".
#[derive(Debug, Clone, Default)]
pub struct ChannelFits {
    pub results: BTreeMap<MotorChannel, ChannelResult>,
}

impl ChannelFits {
    pub fn insert(&mut self, channel: MotorChannel, result: ChannelResult) {
        self.results.insert(channel, result);
    }

    /// The successful fit for `channel`, if any.
    pub fn fitted(&self, channel: MotorChannel) -> Option<&FittedCurveParams> {
        self.results.get(&channel).and_then(|r| r.as_ref().ok())
    }

    pub fn error(&self, channel: MotorChannel) -> Option<&FitError> {
        self.results.get(&channel).and_then(|r| r.as_ref().err())
    }

    /// Successful fits in artifact order.
    pub fn successes(&self) -> Vec<(MotorChannel, &FittedCurveParams)> {
        MotorChannel::ALL
            .iter()
            .filter_map(|&ch| self.fitted(ch).map(|f| (ch, f)))
            .collect()
    }

    pub fn success_count(&self) -> usize {
        self.successes().len()
    }
}
