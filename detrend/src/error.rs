use ccdgeom::GeometryError;
use thiserror::Error;

/// Errors from signature removal.
///
/// All variants are deterministic properties of the inputs: none of them
/// is retryable, and a failed run leaves no partial result behind.
#[derive(Error, Debug)]
pub enum IsrError {
    /// A correction switch is enabled but its calibration input is absent.
    #[error("{stage}: required calibration input is missing")]
    MissingCalibrationInput {
        /// Pipeline stage that needed the input.
        stage: &'static str,
    },

    /// Plane or calibration-frame shape does not match the declared geometry.
    #[error("{stage}: shape mismatch, expected {expected:?} but got {actual:?}")]
    GeometryMismatch {
        /// Pipeline stage that detected the mismatch.
        stage: &'static str,
        /// Expected (height, width).
        expected: (usize, usize),
        /// Actual (height, width).
        actual: (usize, usize),
    },

    /// Malformed configuration or input set.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Detector geometry fault.
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Statistical computation failed.
    #[error("stats computation failed: {0}")]
    Stats(String),
}
