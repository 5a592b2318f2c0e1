//! Instrument signature removal.
//!
//! The pipeline runs in two phases. The amplifier-local phase processes
//! each raw amplifier frame independently (saturation detection, overscan
//! subtraction, linearization) and may run in parallel. After assembly
//! into one trimmed exposure, the image-level phase applies the enabled
//! calibration corrections in a fixed order, builds the variance plane,
//! interpolates over unusable pixels, and records the photometric zero
//! point.
//!
//! Every enabled stage's calibration input is validated up front, before
//! any pixel is touched. A run either produces a complete corrected
//! exposure or fails without a partial result.

pub mod correct;
pub mod interp;
pub mod overscan;
pub mod variance;

use serde::{Deserialize, Serialize};

use ccdgeom::Detector;

use crate::assemble::{assemble_ccd, RawAmpFrame};
use crate::calibration::CalibrationSet;
use crate::error::IsrError;
use crate::exposure::{mask, Exposure, ExposureMetadata};

pub use correct::BrighterFatterKernel;

/// How the overscan level is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverscanMethod {
    /// Median of the whole overscan region.
    Median,
    /// Mean of the whole overscan region.
    Mean,
    /// Per-row medians, tracking drift along the parallel direction.
    MedianPerRow,
}

/// Pipeline configuration switches and parameters.
///
/// The default configuration enables nothing beyond the always-on stages
/// (saturation detection, overscan, assembly, variance, interpolation,
/// flux normalization); each correction is opted into explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsrConfig {
    /// Subtract the bias frame.
    pub do_bias: bool,
    /// Subtract the scaled dark frame.
    pub do_dark: bool,
    /// Divide by the flat field.
    pub do_flat: bool,
    /// Subtract the scaled fringe template.
    pub do_fringe: bool,
    /// Apply the per-amplifier linearity model.
    pub do_linearize: bool,
    /// Apply the iterative brighter-fatter correction.
    pub do_brighter_fatter: bool,
    /// Subtract fringes after flat division instead of before.
    pub fringe_after_flat: bool,
    /// Overscan level estimator.
    pub overscan_method: OverscanMethod,
    /// Brighter-fatter iteration cap.
    pub brighter_fatter_max_iter: usize,
    /// Brighter-fatter convergence threshold on the largest pixel update.
    pub brighter_fatter_threshold: f64,
    /// Run the brighter-fatter iteration in electrons.
    pub brighter_fatter_apply_gain: bool,
    /// Zero-magnitude flux for a 1-second exposure.
    pub flux_mag0_t1: f64,
}

impl Default for IsrConfig {
    fn default() -> Self {
        Self {
            do_bias: false,
            do_dark: false,
            do_flat: false,
            do_fringe: false,
            do_linearize: false,
            do_brighter_fatter: false,
            fringe_after_flat: false,
            overscan_method: OverscanMethod::Median,
            brighter_fatter_max_iter: 10,
            brighter_fatter_threshold: 1000.0,
            brighter_fatter_apply_gain: true,
            flux_mag0_t1: 1e28,
        }
    }
}

/// Check that every enabled stage has its calibration input.
///
/// Runs before any pixel work so a misconfigured invocation fails
/// without wasted computation.
pub fn validate_inputs(
    config: &IsrConfig,
    calib: &CalibrationSet,
    bf_kernel: Option<&BrighterFatterKernel>,
) -> Result<(), IsrError> {
    if config.do_bias && calib.bias.is_none() {
        return Err(IsrError::MissingCalibrationInput { stage: "bias" });
    }
    if config.do_dark && calib.dark.is_none() {
        return Err(IsrError::MissingCalibrationInput { stage: "dark" });
    }
    if config.do_flat && calib.flat.is_none() {
        return Err(IsrError::MissingCalibrationInput { stage: "flat" });
    }
    if config.do_fringe && calib.fringe.is_none() {
        return Err(IsrError::MissingCalibrationInput { stage: "fringe" });
    }
    if config.do_brighter_fatter && bf_kernel.is_none() {
        return Err(IsrError::MissingCalibrationInput {
            stage: "brighter-fatter",
        });
    }
    if !config.flux_mag0_t1.is_finite() || config.flux_mag0_t1 <= 0.0 {
        return Err(IsrError::InvalidConfiguration(format!(
            "flux_mag0_t1 must be positive, got {}",
            config.flux_mag0_t1
        )));
    }
    Ok(())
}

/// Run the full pipeline on one set of raw amplifier frames.
///
/// Validates inputs, runs the amplifier-local phase in parallel, assembles
/// the trimmed exposure, and applies the image-level stages.
pub fn run_isr(
    detector: &Detector,
    frames: Vec<RawAmpFrame>,
    calib: &CalibrationSet,
    bf_kernel: Option<&BrighterFatterKernel>,
    config: &IsrConfig,
    metadata: ExposureMetadata,
) -> Result<Exposure, IsrError> {
    validate_inputs(config, calib, bf_kernel)?;
    tracing::info!(
        "starting signature removal for visit {} on detector {}",
        metadata.visit,
        detector.name()
    );

    let processed = overscan::correct_amps_parallel(detector, frames, config)?;
    let exposure = assemble_ccd(detector, processed, metadata)?;
    run_assembled(detector, exposure, calib, bf_kernel, config)
}

/// Apply the image-level stages to an already assembled exposure.
pub fn run_assembled(
    detector: &Detector,
    mut exposure: Exposure,
    calib: &CalibrationSet,
    bf_kernel: Option<&BrighterFatterKernel>,
    config: &IsrConfig,
) -> Result<Exposure, IsrError> {
    validate_inputs(config, calib, bf_kernel)?;
    exposure.check_planes("assembled")?;

    if config.do_bias {
        let bias = calib.bias.as_ref().ok_or(IsrError::MissingCalibrationInput { stage: "bias" })?;
        correct::bias_correction(&mut exposure, bias)?;
    }

    if config.do_brighter_fatter {
        let kernel = bf_kernel.ok_or(IsrError::MissingCalibrationInput {
            stage: "brighter-fatter",
        })?;
        correct::brighter_fatter_correction(
            &mut exposure,
            kernel,
            config.brighter_fatter_max_iter,
            config.brighter_fatter_threshold,
            config.brighter_fatter_apply_gain,
            detector,
        )?;
    }

    if config.do_dark {
        let dark = calib.dark.as_ref().ok_or(IsrError::MissingCalibrationInput { stage: "dark" })?;
        correct::dark_correction(&mut exposure, dark)?;
    }

    variance::seed_variance(&mut exposure, detector)?;
    variance::variance_floor(&mut exposure)?;

    if config.do_fringe && !config.fringe_after_flat {
        let fringe = calib
            .fringe
            .as_ref()
            .ok_or(IsrError::MissingCalibrationInput { stage: "fringe" })?;
        correct::fringe_correction(&mut exposure, fringe)?;
    }

    if config.do_flat {
        let flat = calib.flat.as_ref().ok_or(IsrError::MissingCalibrationInput { stage: "flat" })?;
        correct::flat_correction(&mut exposure, flat)?;
    }

    interp::mask_defects(&mut exposure, &calib.defects.regions);
    interp::interpolate_masked(&mut exposure, mask::BAD | mask::SAT)?;
    interp::interpolate_non_finite(&mut exposure)?;

    if config.do_fringe && config.fringe_after_flat {
        let fringe = calib
            .fringe
            .as_ref()
            .ok_or(IsrError::MissingCalibrationInput { stage: "fringe" })?;
        correct::fringe_correction(&mut exposure, fringe)?;
    }

    let flux_mag0 = config.flux_mag0_t1 * exposure.metadata.exp_time;
    exposure.metadata.flux_mag0 = Some(flux_mag0);
    tracing::info!(
        "signature removal complete for visit {}, flux_mag0 {flux_mag0:.3e}",
        exposure.metadata.visit
    );

    Ok(exposure)
}
