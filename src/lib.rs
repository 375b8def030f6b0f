//! `motor-curves` library crate.
//!
//! The binary (`motorcal`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the fitter and inverse mapping are reusable from other tools

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
