//! Command-line parsing for the motor calibration curve fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::Side;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "motorcal", version, about = "Motor throttle-to-RPM curve fitter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit all channels from calibration CSVs, print the report and the firmware artifact.
    Fit(FitArgs),
    /// Evaluate the inverse mapping from a previously exported fit JSON.
    Linearize(LinearizeArgs),
}

/// Options for fitting.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Forward calibration CSV (Throttle,Left,Right).
    #[arg(long, value_name = "CSV", env = "MOTORCAL_FORWARD")]
    pub forward: Option<PathBuf>,

    /// Reverse calibration CSV (Throttle,Left,Right; absolute throttle).
    #[arg(long, value_name = "CSV", env = "MOTORCAL_REVERSE")]
    pub reverse: Option<PathBuf>,

    /// Write the firmware parameter artifact (C source) to this file.
    #[arg(short = 'o', long, value_name = "FILE", env = "MOTORCAL_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Export the fitted channels to JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Lower bound for the scale `a`.
    #[arg(long, env = "MOTORCAL_A_MIN")]
    pub a_min: Option<f64>,

    /// Upper bound for the scale `a`.
    #[arg(long, env = "MOTORCAL_A_MAX")]
    pub a_max: Option<f64>,

    /// Lower bound for the exponent `b`.
    #[arg(long, env = "MOTORCAL_B_MIN")]
    pub b_min: Option<f64>,

    /// Upper bound for the exponent `b`.
    #[arg(long, env = "MOTORCAL_B_MAX")]
    pub b_max: Option<f64>,

    /// Lower bound for the deadband (throttle percent).
    #[arg(long, env = "MOTORCAL_DEADBAND_MIN")]
    pub deadband_min: Option<f64>,

    /// Upper bound for the deadband (throttle percent).
    #[arg(long, env = "MOTORCAL_DEADBAND_MAX")]
    pub deadband_max: Option<f64>,

    /// Residual evaluation budget per channel.
    #[arg(long, default_value_t = 10_000, env = "MOTORCAL_MAX_EVALUATIONS")]
    pub max_evaluations: usize,

    /// Only print the artifact (no report).
    #[arg(short, long)]
    pub quiet: bool,
}

/// Options for the inverse mapping.
#[derive(Debug, Parser, Clone)]
pub struct LinearizeArgs {
    /// Curve JSON produced by `motorcal fit --export-json`.
    #[arg(long, value_name = "JSON", env = "MOTORCAL_FITS")]
    pub fits: PathBuf,

    /// Which motor.
    #[arg(long, value_enum)]
    pub side: Side,

    /// Desired signed wheel RPM (negative for reverse).
    #[arg(long, allow_negative_numbers = true, conflicts_with = "pwm", required_unless_present = "pwm")]
    pub rpm: Option<f64>,

    /// Desired signed PWM percent (-100..=100) to compensate.
    #[arg(long, allow_negative_numbers = true, requires = "max_wheel_rpm")]
    pub pwm: Option<i8>,

    /// Wheel RPM at 100% PWM, used with `--pwm`.
    #[arg(long, env = "MOTORCAL_MAX_WHEEL_RPM")]
    pub max_wheel_rpm: Option<u32>,
}
