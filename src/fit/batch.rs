//! Four-channel fan-out.
//!
//! Each channel is fitted independently (in parallel); results are joined into a
//! `ChannelFits` before anything downstream runs. A failing channel is recorded
//! as an `Err` and never affects the others.

use log::{info, warn};
use rayon::prelude::*;

use crate::domain::{ChannelFits, ChannelResult, ChannelSamples, FitConfig, MotorChannel};
use crate::fit::fitter::fit_channel;

/// Fit every channel present in `samples`.
pub fn fit_all(samples: &ChannelSamples, config: &FitConfig) -> ChannelFits {
    let outcomes: Vec<(MotorChannel, ChannelResult)> = samples
        .channels
        .par_iter()
        .map(|(&channel, data)| (channel, fit_channel(data, config)))
        .collect();

    let mut fits = ChannelFits::default();
    for (channel, result) in outcomes {
        match &result {
            Ok(fit) => info!(
                "{}: a={:.6} b={:.6} deadband={:.2} rmse={:.2} ({} evaluations)",
                channel.display_name(),
                fit.params.a,
                fit.params.b,
                fit.params.deadband,
                fit.quality.rmse,
                fit.evaluations
            ),
            Err(err) => warn!("{}: no fit ({err})", channel.display_name()),
        }
        fits.insert(channel, result);
    }
    fits
}
