//! Per-amplifier readout geometry and calibration constants.

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::region::Region;

/// Corner of the raw frame that maps to the physical readout node.
///
/// Raw data is always stored in amplifier-native orientation, so for a
/// symmetric sensor design every amplifier reports the same corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadoutCorner {
    LowerLeft,
    LowerRight,
    UpperLeft,
    UpperRight,
}

/// Linearity response model for one amplifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinearityModel {
    /// Placeholder model used when no measured linearity data exists.
    ///
    /// With a zero threshold this is the identity response up to
    /// `max_adu`; a measured model would replace it without changing the
    /// pipeline stage that applies it.
    Proportional {
        /// ADU level below which no correction applies.
        threshold: f64,
        /// Upper end of the valid correction range, in ADU.
        max_adu: f64,
    },
}

impl LinearityModel {
    /// Apply the model to a single pixel value in ADU.
    pub fn apply(&self, adu: f64) -> f64 {
        match self {
            // Placeholder proportional response: identity within range.
            LinearityModel::Proportional { .. } => adu,
        }
    }
}

/// One independent readout channel of a CCD.
///
/// Encodes the mapping between the amplifier's raw readout frame and its
/// place in the trimmed focal-plane image, plus the per-channel
/// calibration constants. Constructed once from a declarative layout
/// table and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Amplifier {
    /// Amplifier name, e.g. "00".."71".
    pub name: String,
    /// (column, row) index within the amplifier grid.
    pub index: (u8, u8),
    /// Position of the trimmed data in focal-plane coordinates.
    pub bbox: Region,
    /// Full raw readout extent, including overscan and extended register.
    pub raw_bbox: Region,
    /// Light-sensitive data region within the raw frame.
    pub raw_data_bbox: Region,
    /// Serial (horizontal) overscan region within the raw frame.
    pub raw_horizontal_overscan_bbox: Region,
    /// Parallel (vertical) overscan region within the raw frame.
    pub raw_vertical_overscan_bbox: Region,
    /// Placement of this raw frame within a multi-amplifier raw mosaic.
    pub raw_xy_offset: (usize, usize),
    /// Corner of the raw frame at the physical readout node.
    pub readout_corner: ReadoutCorner,
    /// Whether trimmed data must be mirrored in X during assembly.
    pub flip_x: bool,
    /// Whether trimmed data must be mirrored in Y during assembly.
    pub flip_y: bool,
    /// Gain in electrons per ADU.
    pub gain: f64,
    /// Read noise in electrons RMS.
    pub read_noise: f64,
    /// Saturation level in ADU.
    pub saturation: f64,
    /// Linearity response model.
    pub linearity: LinearityModel,
}

impl Amplifier {
    /// Check the internal consistency of this amplifier's geometry.
    ///
    /// The data and overscan regions must be non-overlapping sub-regions
    /// of the raw frame, and the trimmed bounding box must have the same
    /// extent as the raw data region.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let bad = |reason: String| GeometryError::BadLayout {
            detector: self.name.clone(),
            reason,
        };

        let sub_regions = [
            ("raw data", &self.raw_data_bbox),
            ("horizontal overscan", &self.raw_horizontal_overscan_bbox),
            ("vertical overscan", &self.raw_vertical_overscan_bbox),
        ];
        for (label, region) in &sub_regions {
            if !self.raw_bbox.contains_region(region) {
                return Err(bad(format!("{label} region extends outside the raw frame")));
            }
        }
        for i in 0..sub_regions.len() {
            for j in (i + 1)..sub_regions.len() {
                if sub_regions[i].1.overlaps(sub_regions[j].1) {
                    return Err(bad(format!(
                        "{} region overlaps {} region",
                        sub_regions[i].0, sub_regions[j].0
                    )));
                }
            }
        }

        if (self.bbox.width, self.bbox.height)
            != (self.raw_data_bbox.width, self.raw_data_bbox.height)
        {
            return Err(bad(format!(
                "trimmed extent {}x{} does not match raw data extent {}x{}",
                self.bbox.width,
                self.bbox.height,
                self.raw_data_bbox.width,
                self.raw_data_bbox.height
            )));
        }

        Ok(())
    }
}
