//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and initializes logging
//! - parses CLI arguments
//! - runs the fit pipeline and prints the report and artifact
//! - writes optional outputs

use std::path::Path;

use clap::Parser;
use log::{info, warn};

use crate::cli::{Command, FitArgs, LinearizeArgs};
use crate::domain::FitConfig;
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `motorcal` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Linearize(args) => handle_linearize(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    let samples = pipeline::load_samples(args.forward.as_deref(), args.reverse.as_deref())?;
    let run = pipeline::run_fit(samples, &config);

    if !args.quiet {
        println!("{}", crate::report::format_run_summary(&run.samples, &run.fits, &config));
    }

    match &args.output {
        Some(path) => {
            crate::io::write_artifact(path, &run.artifact)?;
            info!("Wrote firmware artifact to {}", path.display());
        }
        None => println!("{}", run.artifact),
    }

    if let Some(path) = &args.export_json {
        crate::io::write_curve_json(path, &run.fits)?;
        info!("Wrote fitted curves to {}", path.display());
    }

    if run.fits.success_count() == 0 {
        return Err(AppError::new(3, "No channel could be fitted."));
    }
    Ok(())
}

fn handle_linearize(args: LinearizeArgs) -> Result<(), AppError> {
    let fits = crate::io::read_curve_json(&args.fits)?;
    let side = args.side.display_name();

    if let Some(pwm) = args.pwm {
        let max_wheel_rpm = args
            .max_wheel_rpm
            .ok_or_else(|| AppError::new(2, "--pwm needs --max-wheel-rpm."))?;
        let out = crate::models::compensate_pwm(args.side, pwm, max_wheel_rpm, &fits)
            .ok_or_else(|| missing_fit(&args.fits, side, f64::from(pwm)))?;
        println!("{side} pwm {pwm}% -> {out}%");
        return Ok(());
    }

    let rpm = args
        .rpm
        .ok_or_else(|| AppError::new(2, "Provide --rpm or --pwm."))?;
    if !rpm.is_finite() {
        return Err(AppError::new(2, format!("--rpm must be a finite number, got {rpm}.")));
    }
    let throttle = crate::models::linearize_rpm(args.side, rpm, &fits)
        .ok_or_else(|| missing_fit(&args.fits, side, rpm))?;
    println!("{side} {rpm} rpm -> {throttle:.2}% throttle");
    Ok(())
}

fn missing_fit(path: &Path, side: &str, request: f64) -> AppError {
    let direction = if request < 0.0 { "reverse" } else { "forward" };
    warn!("{} has no {side} {direction} fit", path.display());
    AppError::new(3, format!("No {side} {direction} fit in '{}'.", path.display()))
}

/// Build the fitter configuration from defaults plus CLI/env overrides.
pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    let mut config = FitConfig::default();
    let bounds = &mut config.bounds;

    let overrides = [
        (args.a_min, &mut bounds.lower.a),
        (args.a_max, &mut bounds.upper.a),
        (args.b_min, &mut bounds.lower.b),
        (args.b_max, &mut bounds.upper.b),
        (args.deadband_min, &mut bounds.lower.deadband),
        (args.deadband_max, &mut bounds.upper.deadband),
    ];
    for (value, slot) in overrides {
        if let Some(v) = value {
            *slot = v;
        }
    }

    config
        .bounds
        .validate()
        .map_err(|e| AppError::new(2, format!("Invalid parameter bounds: {e}")))?;
    config.max_evaluations = args.max_evaluations;
    Ok(config)
}
