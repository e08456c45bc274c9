use std::path::PathBuf;

use crate::transforms::GeometryError;

/// Error types for the calibration conversion.
#[derive(Debug, thiserror::Error)]
pub enum CalibError {
    /// A numeric token or a line of a calibration file could not be parsed.
    #[error("parse error in {}:{line}: {message}", .path.display())]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// Zero-based line index.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// A calibration file is shorter than the record layout requires.
    #[error("missing line {line} in {}", .path.display())]
    MissingLine {
        /// File being parsed.
        path: PathBuf,
        /// Zero-based line index that was expected.
        line: usize,
    },

    /// Invalid rotation or intrinsic matrix.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// Error reading or writing files.
    #[error("error reading or writing file")]
    Io(#[from] std::io::Error),

    /// Failed to serialize a calibration artifact.
    #[error("failed to encode artifact: {0}")]
    Encode(String),

    /// Failed to deserialize a calibration artifact.
    #[error("failed to decode artifact: {0}")]
    Decode(String),

    /// A failure attributed to a single camera of a batch.
    #[error("camera {name}: {source}")]
    Camera {
        /// Name of the source calibration file.
        name: String,
        /// Underlying error.
        source: Box<CalibError>,
    },
}

/// Result alias for the calibration conversion.
pub type CalibResult<T> = Result<T, CalibError>;
