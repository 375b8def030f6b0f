//! Human-readable fit reports.

use crate::domain::{CalibrationSample, ChannelFits, ChannelSamples, FitConfig, FittedCurveParams, MotorChannel};
use crate::report::{Checkpoint, evaluate_fit};

/// Format the full run summary: dataset sizes, bounds, then one block per channel.
pub fn format_run_summary(samples: &ChannelSamples, fits: &ChannelFits, config: &FitConfig) -> String {
    let mut out = String::new();

    out.push_str("=== motorcal - motor response curve fit ===\n");
    out.push_str("Model: rpm = a * (throttle - deadband)^b, 0 inside the deadband\n");
    out.push_str(&format!(
        "Bounds: a=[{}, {}] b=[{}, {}] deadband=[{}, {}]\n",
        config.bounds.lower.a,
        config.bounds.upper.a,
        config.bounds.lower.b,
        config.bounds.upper.b,
        config.bounds.lower.deadband,
        config.bounds.upper.deadband,
    ));
    out.push_str(&format!(
        "Fitted: {}/{} channels\n",
        fits.success_count(),
        samples.channels.len()
    ));

    for channel in MotorChannel::ALL {
        let Some(data) = samples.get(channel) else {
            continue;
        };
        out.push('\n');
        match fits.results.get(&channel) {
            Some(Ok(fit)) => out.push_str(&format_channel_report(channel, data, fit)),
            Some(Err(err)) => {
                out.push_str(&format!("{} ({} samples):\n", channel.display_name(), data.len()));
                out.push_str(&format!("  no fit: {err}\n"));
            }
            None => {
                out.push_str(&format!("{}: not fitted\n", channel.display_name()));
            }
        }
    }

    out
}

/// Parameters, fit quality and the checkpoint table for one channel.
pub fn format_channel_report(
    channel: MotorChannel,
    samples: &[CalibrationSample],
    fit: &FittedCurveParams,
) -> String {
    let mut out = String::new();
    let p = &fit.params;
    let eval = evaluate_fit(samples, p);

    out.push_str(&format!("{} ({} samples):\n", channel.display_name(), samples.len()));
    out.push_str("  Fitted parameters:\n");
    out.push_str(&format!("    a (scale)    = {:.3}\n", p.a));
    out.push_str(&format!("    b (exponent) = {:.3}\n", p.b));
    out.push_str(&format!("    deadband     = {:.1}%\n", p.deadband));
    out.push_str(&format!("    1/b          = {:.3}\n", fit.inv_b));
    out.push_str("  Fit quality:\n");
    out.push_str(&format!("    RMSE         = {:.1} RPM\n", eval.rmse));
    out.push_str(&format!("    Max error    = {:.1} RPM\n", eval.max_error));
    out.push_str(&format!("    Evaluations  = {}\n", fit.evaluations));
    out.push_str("  Predicted values at key throttles:\n");
    for cp in &eval.checkpoints {
        out.push_str(&format_checkpoint(cp));
        out.push('\n');
    }

    out
}

fn format_checkpoint(cp: &Checkpoint) -> String {
    match (cp.actual, cp.error()) {
        (Some(actual), Some(error)) => format!(
            "    {:>3}%: pred={:>5.0} RPM, actual={:>4} RPM, error={:>+5.0} RPM",
            cp.throttle, cp.predicted, actual, error
        ),
        _ => format!("    {:>3}%: pred={:>5.0} RPM (no data)", cp.throttle, cp.predicted),
    }
}
