//! Closed-form inverse of the response model, for runtime compensation.
//!
//! `throttle = deadband + (rpm / a)^(1/b)`, clamped to `[0, 100]`.
//!
//! The signed helpers mirror what the firmware does with the exported curves:
//! the sign of the request picks the forward or reverse curve and is re-applied
//! to the resulting throttle.

use crate::domain::{ChannelFits, Direction, FittedCurveParams, MAX_THROTTLE, MotorChannel, Side};

/// Throttle percent needed to reach `desired_rpm` (a non-negative magnitude).
///
/// Returns `0` for `desired_rpm <= 0` and for NaN.
pub fn rpm_to_throttle(desired_rpm: f64, fit: &FittedCurveParams) -> f64 {
    if desired_rpm.is_nan() || desired_rpm <= 0.0 {
        return 0.0;
    }
    let p = &fit.params;
    let throttle = p.deadband + (desired_rpm / p.a).powf(fit.inv_b);
    throttle.clamp(0.0, f64::from(MAX_THROTTLE))
}

/// Signed throttle percent for a signed rpm request on one side.
///
/// Negative requests use the reverse curve. `None` when the needed channel has
/// no fit.
pub fn linearize_rpm(side: Side, desired_rpm_signed: f64, fits: &ChannelFits) -> Option<f64> {
    if desired_rpm_signed == 0.0 {
        return Some(0.0);
    }
    let is_reverse = desired_rpm_signed < 0.0;
    let direction = if is_reverse { Direction::Reverse } else { Direction::Forward };
    let fit = fits.fitted(MotorChannel::new(side, direction))?;

    let throttle = rpm_to_throttle(desired_rpm_signed.abs(), fit);
    Some(if is_reverse { -throttle } else { throttle })
}

/// Firmware-style stick compensation.
///
/// The requested percent is read as a fraction of `max_wheel_rpm`, converted to
/// a target rpm with integer arithmetic, inverted through the channel curve, and
/// truncated back to a signed percent in `[-100, 100]`.
pub fn compensate_pwm(
    side: Side,
    desired_pwm_percent: i8,
    max_wheel_rpm: u32,
    fits: &ChannelFits,
) -> Option<i8> {
    if desired_pwm_percent == 0 {
        return Some(0);
    }
    let is_reverse = desired_pwm_percent < 0;
    let abs_pwm = i64::from(desired_pwm_percent).abs();
    let desired_rpm = (abs_pwm * i64::from(max_wheel_rpm)) / 100;

    let direction = if is_reverse { Direction::Reverse } else { Direction::Forward };
    let fit = fits.fitted(MotorChannel::new(side, direction))?;

    let throttle = rpm_to_throttle(desired_rpm as f64, fit).trunc() as i64;
    let signed = if is_reverse { -throttle } else { throttle };
    Some(signed.clamp(-100, 100) as i8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurveParams, FitQuality};
    use crate::models::evaluate;

    fn fit(a: f64, b: f64, deadband: f64) -> FittedCurveParams {
        FittedCurveParams {
            params: CurveParams { a, b, deadband },
            inv_b: 1.0 / b,
            quality: FitQuality {
                rmse: 0.0,
                max_error: 0.0,
                n: 0,
            },
            evaluations: 0,
            iterations: 0,
        }
    }

    fn four_channels() -> ChannelFits {
        let mut fits = ChannelFits::default();
        fits.insert(MotorChannel::LEFT_FORWARD, Ok(fit(88.0, 0.5, 10.0)));
        fits.insert(MotorChannel::LEFT_REVERSE, Ok(fit(90.0, 0.5, 12.0)));
        fits.insert(MotorChannel::RIGHT_FORWARD, Ok(fit(5.0, 0.9, 15.0)));
        fits.insert(MotorChannel::RIGHT_REVERSE, Ok(fit(6.0, 0.85, 14.0)));
        fits
    }

    #[test]
    fn non_positive_rpm_maps_to_zero() {
        for f in [fit(5.0, 0.9, 15.0), fit(0.1, 1.5, 0.0), fit(1000.0, 0.5, 25.0)] {
            assert_eq!(rpm_to_throttle(0.0, &f), 0.0);
            assert_eq!(rpm_to_throttle(-10.0, &f), 0.0);
        }
    }

    #[test]
    fn nan_rpm_maps_to_zero() {
        let f = fit(5.0, 0.9, 15.0);
        assert_eq!(rpm_to_throttle(f64::NAN, &f), 0.0);

        let fits = four_channels();
        assert_eq!(linearize_rpm(Side::Right, f64::NAN, &fits), Some(0.0));
    }

    #[test]
    fn inverts_the_model_above_deadband() {
        let f = fit(5.0, 0.9, 15.0);
        let mut t = 15.5;
        while t <= 100.0 {
            let rpm = evaluate(t, &f.params);
            let back = rpm_to_throttle(rpm, &f);
            assert!((back - t).abs() < 1e-3, "t={t} back={back}");
            t += 2.5;
        }
    }

    #[test]
    fn model_of_inverse_recovers_rpm() {
        let f = fit(5.0, 0.9, 15.0);
        let max_rpm = evaluate(100.0, &f.params);
        for rpm in [0.5, 1.0, 20.0, 100.0, 250.0, max_rpm] {
            let t = rpm_to_throttle(rpm, &f);
            let back = evaluate(t, &f.params);
            assert!((back - rpm).abs() < 1e-3 * rpm.max(1.0), "rpm={rpm} back={back}");
        }
    }

    #[test]
    fn monotonic_and_clamped() {
        let f = fit(5.0, 0.9, 15.0);
        let mut prev = 0.0;
        for i in 0..2000 {
            let t = rpm_to_throttle(i as f64, &f);
            assert!(t >= prev);
            assert!((0.0..=100.0).contains(&t));
            prev = t;
        }
        assert_eq!(rpm_to_throttle(1e9, &f), 100.0);
    }

    #[test]
    fn signed_request_selects_direction() {
        let fits = four_channels();
        let fwd = linearize_rpm(Side::Left, 300.0, &fits).unwrap();
        let rev = linearize_rpm(Side::Left, -300.0, &fits).unwrap();

        let lf = fits.fitted(MotorChannel::LEFT_FORWARD).unwrap();
        let lr = fits.fitted(MotorChannel::LEFT_REVERSE).unwrap();
        assert_eq!(fwd, rpm_to_throttle(300.0, lf));
        assert_eq!(rev, -rpm_to_throttle(300.0, lr));
        assert_eq!(linearize_rpm(Side::Right, 0.0, &fits), Some(0.0));
    }

    #[test]
    fn missing_channel_yields_none() {
        let mut fits = ChannelFits::default();
        fits.insert(MotorChannel::LEFT_FORWARD, Ok(fit(88.0, 0.5, 10.0)));
        assert!(linearize_rpm(Side::Left, -100.0, &fits).is_none());
        assert!(compensate_pwm(Side::Right, 50, 800, &fits).is_none());
    }

    #[test]
    fn compensate_pwm_truncates_and_keeps_sign() {
        let fits = four_channels();
        // 50% of 800 rpm = 400 rpm; 10 + (400/88)^2 = 30.66 -> 30
        assert_eq!(compensate_pwm(Side::Left, 50, 800, &fits), Some(30));
        // 400 rpm reverse: 12 + (400/90)^2 = 31.75 -> -31
        assert_eq!(compensate_pwm(Side::Left, -50, 800, &fits), Some(-31));
        assert_eq!(compensate_pwm(Side::Left, 0, 800, &fits), Some(0));
        assert_eq!(compensate_pwm(Side::Left, 100, 100_000, &fits), Some(100));
        assert_eq!(compensate_pwm(Side::Left, -128, 100_000, &fits), Some(-100));
    }
}
