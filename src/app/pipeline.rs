//! Shared "fit pipeline" logic.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV ingest -> per-channel fit (fan-out) -> join -> artifact
//!
//! The CLI and the integration tests can then focus on inputs and presentation.

use std::path::Path;

use log::info;

use crate::domain::{ChannelFits, ChannelSamples, Direction, FitConfig};
use crate::error::AppError;
use crate::io::{generate_artifact, load_direction_csv};

/// All computed outputs of a single `motorcal fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub samples: ChannelSamples,
    pub fits: ChannelFits,
    pub artifact: String,
}

/// Load whichever direction tables were given.
pub fn load_samples(forward: Option<&Path>, reverse: Option<&Path>) -> Result<ChannelSamples, AppError> {
    if forward.is_none() && reverse.is_none() {
        return Err(AppError::new(2, "Provide at least one of --forward or --reverse."));
    }

    let mut samples = ChannelSamples::default();
    for (path, direction) in [(forward, Direction::Forward), (reverse, Direction::Reverse)] {
        let Some(path) = path else {
            continue;
        };
        let table = load_direction_csv(path)?;
        info!(
            "Loaded {} {} rows from {}",
            table.len(),
            direction.display_name().to_lowercase(),
            path.display()
        );
        table.into_channels(direction, &mut samples);
    }
    Ok(samples)
}

/// Fit every channel and render the artifact.
///
/// Per-channel failures stay inside `fits`; this never fails.
pub fn run_fit(samples: ChannelSamples, config: &FitConfig) -> RunOutput {
    let fits = crate::fit::fit_all(&samples, config);
    let artifact = generate_artifact(&fits);
    RunOutput {
        samples,
        fits,
        artifact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_input_is_an_input_error() {
        let err = load_samples(None, None).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = load_samples(Some(Path::new("/nonexistent/motorcal/fwd.csv")), None).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
