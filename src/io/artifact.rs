//! Firmware parameter artifact (C source text).
//!
//! The artifact is a pure function of the fitted channels: the same fits always
//! produce byte-identical text. Channels without a fit are left out; the
//! reference wrappers that need all four curves are only emitted when all four
//! exist.

use std::fs;
use std::path::Path;

use crate::domain::{ChannelFits, FittedCurveParams, MotorChannel};
use crate::error::AppError;

const HEADER: &str = "\
/*
 * Motor linearization using fitted power law curves
 *
 * Model: RPM = a * (throttle - deadband)^b for throttle > deadband
 *        RPM = 0 for throttle <= deadband
 *
 * Inverse: throttle = deadband + (RPM / a)^(1/b)
 *
 * Generated by motorcal.
 */

#include <math.h>
#include <stdbool.h>
#include <stdint.h>

// Fitted curve parameters (from calibration data)
typedef struct {
    float a;         // Scale factor
    float b;         // Exponent
    float deadband;  // Deadband threshold (%)
    float inv_b;     // 1/b (precomputed for efficiency)
} motor_curve_params_t;
";

const RPM_TO_THROTTLE: &str = "
/**
 * Convert desired RPM to the PWM throttle percentage needed.
 *
 * @param desired_rpm Target wheel RPM (absolute value)
 * @param params Curve parameters for this motor/direction
 * @return Throttle percentage (0-100)
 */
static float rpm_to_throttle(float desired_rpm, const motor_curve_params_t* params) {
    if (desired_rpm <= 0.0f) {
        return 0.0f;
    }

    float throttle = params->deadband + powf(desired_rpm / params->a, params->inv_b);

    if (throttle < 0.0f) throttle = 0.0f;
    if (throttle > 100.0f) throttle = 100.0f;

    return throttle;
}
";

const SIGNED_WRAPPERS: &str = "
#ifndef MAX_WHEEL_RPM
#error \"MAX_WHEEL_RPM must be defined before including the motor curves\"
#endif

/**
 * Convert a signed RPM request into a signed PWM percentage.
 *
 * @param motor MOTOR_LEFT_DRIVE or MOTOR_RIGHT_DRIVE
 * @param desired_rpm_signed Desired RPM (negative for reverse)
 * @return PWM percentage (-100 to +100)
 */
int8_t linearize_motor_command(motor_id_t motor, int16_t desired_rpm_signed) {
    const motor_curve_params_t* params;
    bool is_reverse = (desired_rpm_signed < 0);
    float desired_rpm = fabsf((float)desired_rpm_signed);

    if (motor == MOTOR_LEFT_DRIVE) {
        params = is_reverse ? &LEFT_REVERSE_CURVE : &LEFT_FORWARD_CURVE;
    } else {
        params = is_reverse ? &RIGHT_REVERSE_CURVE : &RIGHT_FORWARD_CURVE;
    }

    float throttle = rpm_to_throttle(desired_rpm, params);

    return (int8_t)(is_reverse ? -throttle : throttle);
}

/**
 * Throttle-to-throttle linearization for controller input.
 *
 * @param motor MOTOR_LEFT_DRIVE or MOTOR_RIGHT_DRIVE
 * @param desired_pwm_percent PWM from controller/expo curve (-100 to +100)
 * @return Compensated PWM percentage
 */
int8_t linearize_throttle_command(motor_id_t motor, int8_t desired_pwm_percent) {
    int16_t desired_rpm = (desired_pwm_percent * MAX_WHEEL_RPM) / 100;
    return linearize_motor_command(motor, desired_rpm);
}
";

/// Render the artifact for every successfully fitted channel.
pub fn generate_artifact(fits: &ChannelFits) -> String {
    let mut out = String::from(HEADER);

    let fitted = fits.successes();
    for (channel, fit) in &fitted {
        out.push_str(&format_record(*channel, fit));
    }

    out.push_str(RPM_TO_THROTTLE);

    let missing = missing_channels(fits);
    if missing.is_empty() {
        out.push_str(SIGNED_WRAPPERS);
    } else {
        let names: Vec<String> = missing.iter().map(|ch| ch.symbol_name()).collect();
        out.push_str(&format!(
            "\n// linearize_motor_command() and linearize_throttle_command() omitted:\n// no fit for {}\n",
            names.join(", ")
        ));
    }

    out
}

/// One `static const` record.
pub fn format_record(channel: MotorChannel, fit: &FittedCurveParams) -> String {
    let p = &fit.params;
    let mut out = format!("\nstatic const motor_curve_params_t {} = {{\n", channel.symbol_name());
    out.push_str(&format!("    .a = {}f,\n", c_float(p.a)));
    out.push_str(&format!("    .b = {}f,\n", c_float(p.b)));
    out.push_str(&format!("    .deadband = {:.2}f,\n", p.deadband));
    out.push_str(&format!("    .inv_b = {}f  // 1/b for inverse calculation\n", c_float(fit.inv_b)));
    out.push_str("};\n");
    out
}

/// Fixed-point text with at least six decimals and at least six significant digits.
fn c_float(value: f64) -> String {
    const MIN_DECIMALS: i32 = 6;
    const SIGNIFICANT: i32 = 6;
    let decimals = if value.is_finite() && value != 0.0 {
        let magnitude = value.abs().log10().floor() as i32;
        (SIGNIFICANT - 1 - magnitude).clamp(MIN_DECIMALS, 17)
    } else {
        MIN_DECIMALS
    };
    format!("{value:.prec$}", prec = decimals as usize)
}

/// Channels (in artifact order) without a successful fit.
pub fn missing_channels(fits: &ChannelFits) -> Vec<MotorChannel> {
    MotorChannel::ALL
        .into_iter()
        .filter(|&ch| fits.fitted(ch).is_none())
        .collect()
}

/// Write artifact text to `path`.
pub fn write_artifact(path: &Path, text: &str) -> Result<(), AppError> {
    fs::write(path, text)
        .map_err(|e| AppError::new(2, format!("Failed to write artifact '{}': {e}", path.display())))
}
