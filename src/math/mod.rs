//! Numerical utilities: dense least squares and a bounded nonlinear solver.

pub mod lm;
pub mod lstsq;

pub use lm::*;
pub use lstsq::*;
