//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - firmware parameter artifact (`artifact`)
//! - curve JSON read/write (`curve`)

pub mod artifact;
pub mod curve;
pub mod ingest;

pub use artifact::*;
pub use curve::*;
pub use ingest::*;
