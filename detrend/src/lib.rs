//! Instrument signature removal for CCD exposures.
//!
//! Takes raw per-amplifier readouts, removes the electronic and optical
//! signatures imprinted by the detector (overscan level, bias and dark
//! structure, pixel response, fringing, brighter-fatter charge transfer),
//! and produces one assembled exposure with image, mask, and variance
//! planes. Detector geometry comes from the `ccdgeom` crate.

pub mod assemble;
pub mod calibration;
pub mod error;
pub mod exposure;
pub mod isr;
pub mod stats;

pub use assemble::{assemble_ccd, extract_amp, ProcessedAmpFrame, RawAmpFrame};
pub use calibration::{
    standardize_bias, standardize_dark, standardize_flat, standardize_fringe, CalibrationInput,
    CalibrationSet, DefectList, FringeSet,
};
pub use error::IsrError;
pub use exposure::{mask, Exposure, ExposureMetadata, ImageType};
pub use isr::{run_assembled, run_isr, BrighterFatterKernel, IsrConfig, OverscanMethod};
