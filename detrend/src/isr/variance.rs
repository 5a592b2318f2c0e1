//! Variance plane construction.

use ndarray::{s, Zip};

use ccdgeom::Detector;

use crate::error::IsrError;
use crate::exposure::Exposure;
use crate::stats;

/// Seed the variance plane from per-amplifier gain and read noise.
///
/// For each amplifier region the expected variance in ADU^2 is the shot
/// term `image / gain` plus the read-noise term `(read_noise / gain)^2`.
/// The shot term is clamped at zero: after overscan and dark subtraction
/// the image can dip below zero, and negative Poisson contributions are
/// not physical.
pub fn seed_variance(exposure: &mut Exposure, detector: &Detector) -> Result<(), IsrError> {
    let bbox = detector.bbox();
    let expected = (bbox.height, bbox.width);
    if exposure.dim() != expected {
        return Err(IsrError::GeometryMismatch {
            stage: "variance",
            expected,
            actual: exposure.dim(),
        });
    }

    for amp in detector.amplifiers() {
        let read_term = (amp.read_noise / amp.gain).powi(2);
        let gain = amp.gain;
        let image = exposure
            .image
            .slice(s![amp.bbox.y_range(), amp.bbox.x_range()]);
        let variance = exposure
            .variance
            .slice_mut(s![amp.bbox.y_range(), amp.bbox.x_range()]);
        Zip::from(variance)
            .and(image)
            .for_each(|var, &pixel| *var = pixel.max(0.0) / gain + read_term);
    }
    tracing::debug!("seeded variance plane from gain and read noise");
    Ok(())
}

/// Replace non-positive variance with a robust image-derived estimate.
///
/// Dark or bias over-subtraction can drive the computed variance negative,
/// which must never reach downstream weighting. The replacement is the
/// square of a robust standard deviation derived from the image's
/// interquartile range, `0.74 * (Q3 - Q1)` (the normal-distribution
/// IQR-to-sigma conversion).
pub fn variance_floor(exposure: &mut Exposure) -> Result<(), IsrError> {
    let samples: Vec<f64> = exposure.image.iter().copied().collect();
    let (q1, q3) = stats::quartiles(&samples).map_err(IsrError::Stats)?;
    let stdev = 0.74 * (q3 - q1);
    let floor = stdev * stdev;

    let mut replaced = 0usize;
    exposure.variance.mapv_inplace(|var| {
        if var > 0.0 {
            var
        } else {
            replaced += 1;
            floor
        }
    });
    if replaced > 0 {
        tracing::debug!("variance floor replaced {replaced} non-positive pixels with {floor:.3}");
    }
    Ok(())
}
