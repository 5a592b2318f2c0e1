//! Exposure planes and metadata.
//!
//! An [`Exposure`] bundles the image plane with a per-pixel mask and a
//! variance plane of the same shape, plus the already-resolved metadata
//! record supplied by the ingest layer. Exposures are created per input
//! frame, mutated in place by the pipeline stages, and owned exclusively
//! by the invocation processing them.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::IsrError;

/// Mask plane bit assignments.
pub mod mask {
    /// Pixel at or above the amplifier saturation level.
    pub const SAT: u16 = 1 << 0;
    /// Pixel in a known defect region or otherwise unusable.
    pub const BAD: u16 = 1 << 1;
    /// Pixel value replaced by interpolation.
    pub const INTRP: u16 = 1 << 2;
    /// Pixel with no detector coverage.
    pub const NO_DATA: u16 = 1 << 3;
}

/// Classification of an exposure by what it observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageType {
    Bias,
    Dark,
    Flat,
    Fringe,
    Object,
    Unknown,
}

/// Header-derived metadata for one exposure.
///
/// Field values arrive pre-resolved from the ingest layer; the core never
/// parses vendor headers itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureMetadata {
    /// Integration time in seconds.
    pub exp_time: f64,
    /// Target name.
    pub object: String,
    /// Filter band name.
    pub filter: String,
    /// Exposure number assigned by the data acquisition system.
    pub visit: u64,
    /// What kind of frame this is.
    pub image_type: ImageType,
    /// Sensor serial number, when recorded.
    pub serial: Option<String>,
    /// Observation date string, when recorded.
    pub date: Option<String>,
    /// Flux corresponding to magnitude zero, set by flux normalization.
    pub flux_mag0: Option<f64>,
}

impl Default for ExposureMetadata {
    fn default() -> Self {
        Self {
            exp_time: 0.0,
            object: "UNKNOWN".to_string(),
            filter: "NONE".to_string(),
            visit: 0,
            image_type: ImageType::Unknown,
            serial: None,
            date: None,
            flux_mag0: None,
        }
    }
}

/// An image with its mask and variance planes.
#[derive(Debug, Clone)]
pub struct Exposure {
    /// Pixel values in ADU.
    pub image: Array2<f64>,
    /// Per-pixel flag bits, see [`mask`].
    pub mask: Array2<u16>,
    /// Per-pixel variance estimate in ADU^2.
    pub variance: Array2<f64>,
    /// Header-derived metadata.
    pub metadata: ExposureMetadata,
}

impl Exposure {
    /// Create an exposure with zeroed planes.
    pub fn new(height: usize, width: usize, metadata: ExposureMetadata) -> Self {
        Self {
            image: Array2::zeros((height, width)),
            mask: Array2::zeros((height, width)),
            variance: Array2::zeros((height, width)),
            metadata,
        }
    }

    /// Wrap an image plane, with zeroed mask and variance.
    pub fn from_image(image: Array2<f64>, metadata: ExposureMetadata) -> Self {
        let dim = image.dim();
        Self {
            image,
            mask: Array2::zeros(dim),
            variance: Array2::zeros(dim),
            metadata,
        }
    }

    /// Plane shape as (height, width).
    pub fn dim(&self) -> (usize, usize) {
        self.image.dim()
    }

    /// Check that all three planes have the same shape.
    pub fn check_planes(&self, stage: &'static str) -> Result<(), IsrError> {
        let expected = self.image.dim();
        for actual in [self.mask.dim(), self.variance.dim()] {
            if actual != expected {
                return Err(IsrError::GeometryMismatch {
                    stage,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}
