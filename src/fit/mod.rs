//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - build the initial guess and run the bounded solver for one channel
//! - fan the four channels out in parallel and join the results

pub mod batch;
pub mod fitter;

pub use batch::*;
pub use fitter::*;
