//! CCD assembly: raw per-amplifier frames to one trimmed exposure.
//!
//! Assembly is a pure geometric re-layout. For each amplifier the data
//! region is cut out of the raw frame, mirrored according to the
//! amplifier's flips (a reflection, never an interpolation), and placed
//! at the amplifier's trimmed focal-plane position. No pixel value is
//! altered beyond the mirror operations.

use std::collections::HashMap;

use ndarray::{s, Array2, Axis};

use ccdgeom::{Amplifier, Detector};

use crate::error::IsrError;
use crate::exposure::{Exposure, ExposureMetadata};

/// One raw amplifier readout, tagged with its amplifier name.
///
/// Pixel values are in ADU. The plane covers the amplifier's full raw
/// bounding box including overscan.
#[derive(Debug, Clone)]
pub struct RawAmpFrame {
    /// Amplifier name, matching the detector model.
    pub name: String,
    /// Raw pixel values.
    pub image: Array2<f64>,
}

impl RawAmpFrame {
    /// Build a raw frame from integer counts, converting to float.
    pub fn from_u16(name: impl Into<String>, counts: &Array2<u16>) -> Self {
        Self {
            name: name.into(),
            image: counts.mapv(f64::from),
        }
    }
}

/// An amplifier frame after the amplifier-local corrections.
///
/// Planes still cover the raw bounding box; trimming happens at assembly.
#[derive(Debug, Clone)]
pub struct ProcessedAmpFrame {
    /// Amplifier name, matching the detector model.
    pub name: String,
    /// Corrected pixel values.
    pub image: Array2<f64>,
    /// Per-pixel flag bits accumulated so far (saturation).
    pub mask: Array2<u16>,
}

fn oriented_cutout<T: Copy>(amp: &Amplifier, plane: &Array2<T>) -> Array2<T> {
    let mut data = plane
        .slice(s![amp.raw_data_bbox.y_range(), amp.raw_data_bbox.x_range()])
        .to_owned();
    if amp.flip_x {
        data.invert_axis(Axis(1));
    }
    if amp.flip_y {
        data.invert_axis(Axis(0));
    }
    data
}

/// Assemble processed amplifier frames into one trimmed exposure.
///
/// The amplifier-name set of `frames` must exactly match the detector's
/// amplifier set, and each frame must have the shape of its amplifier's
/// raw bounding box; anything else is a fatal configuration error.
pub fn assemble_ccd(
    detector: &Detector,
    frames: Vec<ProcessedAmpFrame>,
    metadata: ExposureMetadata,
) -> Result<Exposure, IsrError> {
    let mut by_name: HashMap<String, ProcessedAmpFrame> = frames
        .into_iter()
        .map(|frame| (frame.name.clone(), frame))
        .collect();

    let bbox = detector.bbox();
    let mut exposure = Exposure::new(bbox.height, bbox.width, metadata);

    for amp in detector.amplifiers() {
        let frame = by_name.remove(&amp.name).ok_or_else(|| {
            IsrError::InvalidConfiguration(format!("no frame supplied for amplifier {}", amp.name))
        })?;

        let expected = (amp.raw_bbox.height, amp.raw_bbox.width);
        if frame.image.dim() != expected {
            return Err(IsrError::GeometryMismatch {
                stage: "assemble",
                expected,
                actual: frame.image.dim(),
            });
        }
        if frame.mask.dim() != expected {
            return Err(IsrError::GeometryMismatch {
                stage: "assemble",
                expected,
                actual: frame.mask.dim(),
            });
        }

        let image = oriented_cutout(amp, &frame.image);
        let mask = oriented_cutout(amp, &frame.mask);
        exposure
            .image
            .slice_mut(s![amp.bbox.y_range(), amp.bbox.x_range()])
            .assign(&image);
        exposure
            .mask
            .slice_mut(s![amp.bbox.y_range(), amp.bbox.x_range()])
            .assign(&mask);
    }

    if !by_name.is_empty() {
        let mut names: Vec<String> = by_name.into_keys().collect();
        names.sort();
        return Err(IsrError::InvalidConfiguration(format!(
            "unexpected amplifier frames: {}",
            names.join(", ")
        )));
    }

    tracing::debug!(
        "assembled {} amplifiers into a {}x{} exposure",
        detector.amplifiers().len(),
        bbox.width,
        bbox.height
    );
    Ok(exposure)
}

/// Cut an amplifier's trimmed region back out of an assembled exposure,
/// undoing the assembly mirrors.
///
/// Inverse of the placement done by [`assemble_ccd`]; used by tests and
/// by diagnostics that compare against raw data.
pub fn extract_amp(exposure: &Exposure, amp: &Amplifier) -> Array2<f64> {
    let mut data = exposure
        .image
        .slice(s![amp.bbox.y_range(), amp.bbox.x_range()])
        .to_owned();
    // The mirrors are involutions, so applying them again restores the
    // amplifier-native orientation.
    if amp.flip_x {
        data.invert_axis(Axis(1));
    }
    if amp.flip_y {
        data.invert_axis(Axis(0));
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccdgeom::ccd250;
    use ndarray::Array2;

    fn ramp_frame(amp: &Amplifier, offset: f64) -> ProcessedAmpFrame {
        let shape = (amp.raw_bbox.height, amp.raw_bbox.width);
        let image = Array2::from_shape_fn(shape, |(y, x)| offset + (y * 1000 + x) as f64);
        ProcessedAmpFrame {
            name: amp.name.clone(),
            image,
            mask: Array2::zeros(shape),
        }
    }

    #[test]
    fn test_assembled_shape() {
        let detector = ccd250::detector().unwrap();
        let frames: Vec<ProcessedAmpFrame> = detector
            .amplifiers()
            .iter()
            .map(|amp| ramp_frame(amp, 0.0))
            .collect();
        let exposure = assemble_ccd(&detector, frames, ExposureMetadata::default()).unwrap();
        assert_eq!(exposure.dim(), (4004, 4096));
    }

    #[test]
    fn test_round_trip_exact() {
        let detector = ccd250::detector().unwrap();
        let frames: Vec<ProcessedAmpFrame> = detector
            .amplifiers()
            .iter()
            .enumerate()
            .map(|(i, amp)| ramp_frame(amp, i as f64 * 1e7))
            .collect();
        let originals: Vec<Array2<f64>> = frames
            .iter()
            .zip(detector.amplifiers())
            .map(|(frame, amp)| {
                frame
                    .image
                    .slice(s![amp.raw_data_bbox.y_range(), amp.raw_data_bbox.x_range()])
                    .to_owned()
            })
            .collect();

        let exposure = assemble_ccd(&detector, frames, ExposureMetadata::default()).unwrap();

        for (amp, original) in detector.amplifiers().iter().zip(&originals) {
            let extracted = extract_amp(&exposure, amp);
            assert_eq!(&extracted, original, "amplifier {}", amp.name);
        }
    }

    #[test]
    fn test_missing_amplifier_fatal() {
        let detector = ccd250::detector().unwrap();
        let mut frames: Vec<ProcessedAmpFrame> = detector
            .amplifiers()
            .iter()
            .map(|amp| ramp_frame(amp, 0.0))
            .collect();
        frames.pop();
        let result = assemble_ccd(&detector, frames, ExposureMetadata::default());
        assert!(matches!(result, Err(IsrError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_unexpected_amplifier_fatal() {
        let detector = ccd250::detector().unwrap();
        let mut frames: Vec<ProcessedAmpFrame> = detector
            .amplifiers()
            .iter()
            .map(|amp| ramp_frame(amp, 0.0))
            .collect();
        let mut extra = frames[0].clone();
        extra.name = "99".to_string();
        frames.push(extra);
        let result = assemble_ccd(&detector, frames, ExposureMetadata::default());
        assert!(matches!(result, Err(IsrError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_wrong_shape_fatal() {
        let detector = ccd250::detector().unwrap();
        let mut frames: Vec<ProcessedAmpFrame> = detector
            .amplifiers()
            .iter()
            .map(|amp| ramp_frame(amp, 0.0))
            .collect();
        frames[3].image = Array2::zeros((10, 10));
        let result = assemble_ccd(&detector, frames, ExposureMetadata::default());
        assert!(matches!(
            result,
            Err(IsrError::GeometryMismatch {
                stage: "assemble",
                ..
            })
        ));
    }
}
