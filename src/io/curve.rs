//! Read/write fitted-curve JSON files.
//!
//! Curve JSON is the portable representation of a calibration run: one entry
//! per successfully fitted channel. `motorcal linearize` reads it back to
//! evaluate the inverse mapping without refitting.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{ChannelFits, FittedCurveParams, MAX_THROTTLE, MotorChannel};
use crate::error::AppError;

/// On-disk schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveFile {
    pub tool: String,
    pub channels: Vec<ChannelEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub channel: MotorChannel,
    pub fit: FittedCurveParams,
}

impl CurveFile {
    /// Successful channels only, in artifact order.
    pub fn from_fits(fits: &ChannelFits) -> Self {
        Self {
            tool: "motorcal".to_string(),
            channels: fits
                .successes()
                .into_iter()
                .map(|(channel, fit)| ChannelEntry {
                    channel,
                    fit: fit.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild `ChannelFits`, rejecting entries that could not have come from the fitter.
    pub fn into_fits(self) -> Result<ChannelFits, AppError> {
        let mut fits = ChannelFits::default();
        for entry in self.channels {
            let name = entry.channel.display_name();
            if fits.fitted(entry.channel).is_some() {
                return Err(AppError::new(2, format!("Duplicate curve entry for {name}.")));
            }
            validate_fit(&entry.fit).map_err(|e| AppError::new(2, format!("Invalid curve for {name}: {e}")))?;
            fits.insert(entry.channel, Ok(entry.fit));
        }
        Ok(fits)
    }
}

/// Relative tolerance between a stored `inv_b` and `1 / b`.
const INV_B_TOLERANCE: f64 = 1e-9;

/// Invariants the inverse mapping relies on.
fn validate_fit(fit: &FittedCurveParams) -> Result<(), String> {
    let p = &fit.params;
    if !(p.a.is_finite() && p.a > 0.0) {
        return Err(format!("scale a={} must be finite and positive", p.a));
    }
    if !(p.b.is_finite() && p.b > 0.0) {
        return Err(format!("exponent b={} must be finite and positive", p.b));
    }
    if !(p.deadband.is_finite() && (0.0..=f64::from(MAX_THROTTLE)).contains(&p.deadband)) {
        return Err(format!("deadband {} outside 0..=100", p.deadband));
    }
    let expected = 1.0 / p.b;
    if !fit.inv_b.is_finite() || (fit.inv_b - expected).abs() > INV_B_TOLERANCE * expected.max(1.0) {
        return Err(format!("inv_b={} does not match 1/b={expected}", fit.inv_b));
    }
    Ok(())
}

/// Write a curve JSON file.
pub fn write_curve_json(path: &Path, fits: &ChannelFits) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create curve JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, &CurveFile::from_fits(fits))
        .map_err(|e| AppError::new(2, format!("Failed to write curve JSON: {e}")))?;

    Ok(())
}

/// Read a curve JSON file.
pub fn read_curve_json(path: &Path) -> Result<ChannelFits, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open curve JSON '{}': {e}", path.display())))?;
    let curve: CurveFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid curve JSON: {e}")))?;
    curve.into_fits()
}
