#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Camera calibration records.
pub mod camera;

/// Re-expression of calibrations under the target world-frame convention.
pub mod convert;

/// Error types for the calibration conversion.
pub mod error;

/// I/O utilities for reading and writing calibration files.
pub mod io;

/// Rotation and rigid transform algebra.
pub mod transforms;

pub use error::{CalibError, CalibResult};
