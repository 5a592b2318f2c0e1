//! Calibration product ingestion and the calibration set.
//!
//! Calibration frames arrive from storage either as a bare image plane or
//! as a full exposure bundle; the `standardize_*` adapters coerce both to
//! one canonical [`Exposure`] shape at the storage boundary so the
//! pipeline core only ever sees exposures. The adapters also enforce the
//! normalization invariants the corrections rely on: darks are stored per
//! unit exposure time and flats with unit mean.

use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use ccdgeom::Region;

use crate::error::IsrError;
use crate::exposure::{Exposure, ExposureMetadata, ImageType};

/// A calibration product as read from storage.
#[derive(Debug, Clone)]
pub enum CalibrationInput {
    /// A bare image plane with no mask or variance.
    Plain(Array2<f64>),
    /// A full image/mask/variance bundle.
    Full(Exposure),
}

impl CalibrationInput {
    fn into_exposure(self, image_type: ImageType) -> Exposure {
        let mut exposure = match self {
            CalibrationInput::Plain(image) => {
                Exposure::from_image(image, ExposureMetadata::default())
            }
            CalibrationInput::Full(exposure) => exposure,
        };
        exposure.metadata.image_type = image_type;
        exposure
    }
}

/// Standardize a bias frame.
///
/// Bias frames capture zero-exposure readout structure; their integration
/// time is defined to be zero.
pub fn standardize_bias(input: CalibrationInput) -> Exposure {
    let mut exposure = input.into_exposure(ImageType::Bias);
    exposure.metadata.exp_time = 0.0;
    exposure
}

/// Standardize a dark frame, normalizing it to a 1-second reference.
///
/// `exp_time` is the integration time of the supplied frame in seconds.
/// The stored image is divided by it so that dark correction can scale by
/// the science exposure time alone; this normalization is an invariant of
/// every [`CalibrationSet`], not a property of one ingestion path.
pub fn standardize_dark(input: CalibrationInput, exp_time: f64) -> Result<Exposure, IsrError> {
    if !exp_time.is_finite() || exp_time <= 0.0 {
        return Err(IsrError::InvalidConfiguration(format!(
            "dark frame exposure time must be positive, got {exp_time}"
        )));
    }
    let mut exposure = input.into_exposure(ImageType::Dark);
    exposure.image.mapv_inplace(|v| v / exp_time);
    exposure.variance.mapv_inplace(|v| v / (exp_time * exp_time));
    exposure.metadata.exp_time = 1.0;
    Ok(exposure)
}

/// Standardize a flat frame, scaling it to unit mean.
pub fn standardize_flat(input: CalibrationInput) -> Result<Exposure, IsrError> {
    let mut exposure = input.into_exposure(ImageType::Flat);
    let mean = exposure
        .image
        .mean()
        .ok_or_else(|| IsrError::InvalidConfiguration("flat frame is empty".to_string()))?;
    if !mean.is_finite() || mean <= 0.0 {
        return Err(IsrError::InvalidConfiguration(format!(
            "flat frame mean must be positive and finite, got {mean}"
        )));
    }
    exposure.image.mapv_inplace(|v| v / mean);
    exposure.variance.mapv_inplace(|v| v / (mean * mean));
    Ok(exposure)
}

/// Standardize a fringe template with its subtraction scale factor.
pub fn standardize_fringe(input: CalibrationInput, scale: f64) -> Result<FringeSet, IsrError> {
    if !scale.is_finite() {
        return Err(IsrError::InvalidConfiguration(format!(
            "fringe scale must be finite, got {scale}"
        )));
    }
    Ok(FringeSet {
        template: input.into_exposure(ImageType::Fringe),
        scale,
    })
}

/// A fringe template and the factor it is scaled by before subtraction.
#[derive(Debug, Clone)]
pub struct FringeSet {
    /// The fringe pattern exposure.
    pub template: Exposure,
    /// Multiplicative scale applied to the template.
    pub scale: f64,
}

/// Known bad regions for a sensor, persisted as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefectList {
    /// Detector name the regions apply to.
    pub detector: String,
    /// Bad regions in trimmed pixel coordinates.
    pub regions: Vec<Region>,
}

impl DefectList {
    /// Create a defect list for a detector.
    pub fn new(detector: impl Into<String>, regions: Vec<Region>) -> Self {
        Self {
            detector: detector.into(),
            regions,
        }
    }

    /// Number of defect regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// True if there are no defect regions.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Save to a JSON file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// The optional calibration inputs for one pipeline run.
///
/// Every member is independently optional; which of them must be present
/// is decided by the pipeline configuration switches. The set is
/// immutable during a run and may be shared by reference across
/// concurrently processing exposures.
#[derive(Debug, Clone, Default)]
pub struct CalibrationSet {
    /// Bias frame, same geometry as a trimmed detector image.
    pub bias: Option<Exposure>,
    /// Dark frame, normalized to a 1-second reference.
    pub dark: Option<Exposure>,
    /// Flat frame, normalized to unit mean.
    pub flat: Option<Exposure>,
    /// Fringe template and scale.
    pub fringe: Option<FringeSet>,
    /// Known bad regions.
    pub defects: DefectList,
}
