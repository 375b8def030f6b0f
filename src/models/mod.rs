//! Response model and its inverse.
//!
//! Both are small, pure functions so that fitting, reporting and the inverse
//! mapping can share them.

pub mod inverse;
pub mod model;

pub use inverse::*;
pub use model::*;
