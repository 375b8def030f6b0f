//! Error types.
//!
//! Two layers:
//!
//! - `AppError` is the application-boundary error. It carries a process exit code
//!   and a human-readable message and is what `main` reports.
//! - `FitError` describes why a single motor channel has no fit. It is a value,
//!   not a control-flow escape: a failed channel sits next to the successful ones
//!   in `ChannelFits` and never aborts the run.

use thiserror::Error;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let code = match err {
            FitError::MalformedSample { .. } => 2,
            FitError::InsufficientData { .. } => 3,
            FitError::ConvergenceFailure(_) => 4,
        };
        AppError::new(code, err.to_string())
    }
}

/// Why a channel could not be fitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Too few samples with a non-zero rpm reading.
    #[error("insufficient data: {nonzero} non-zero rpm samples, need at least {required}")]
    InsufficientData { nonzero: usize, required: usize },

    /// The bounded optimizer did not produce a usable solution.
    #[error("convergence failure: {0}")]
    ConvergenceFailure(#[from] ConvergenceCause),

    /// A sample (or raw cell) violates the input domain.
    #[error("malformed sample at row {index}: {reason}")]
    MalformedSample { index: usize, reason: String },
}

/// Underlying cause of a `FitError::ConvergenceFailure`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvergenceCause {
    #[error("evaluation budget exhausted after {evaluations} residual evaluations")]
    BudgetExhausted { evaluations: usize },

    #[error("singular Jacobian: no parameter moves the residuals")]
    SingularJacobian,

    #[error("non-finite residual encountered")]
    NonFiniteResidual,

    #[error("infeasible bounds: {0}")]
    InfeasibleBounds(String),
}
