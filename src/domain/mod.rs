//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - calibration inputs (`CalibrationSample`, `MotorChannel`, `ChannelSamples`)
//! - curve parameters and their bounds (`CurveParams`, `ParamBounds`)
//! - fit outputs (`FittedCurveParams`, `FitQuality`, `ChannelFits`)
//! - fitter configuration (`FitConfig`)

pub mod types;

pub use types::*;
