//! Amplifier-local corrections applied before CCD assembly.
//!
//! Each amplifier's raw frame is processed independently of the others:
//! saturation detection, overscan subtraction, and (when enabled) the
//! linearity correction read only that amplifier's pixels and geometry
//! entry. The corrections may therefore run in parallel across
//! amplifiers; assembly waits for all of them.

use ndarray::{s, Array2};
use rayon::prelude::*;

use ccdgeom::{Amplifier, Detector};

use crate::assemble::{ProcessedAmpFrame, RawAmpFrame};
use crate::error::IsrError;
use crate::exposure::mask;
use crate::isr::{IsrConfig, OverscanMethod};
use crate::stats;

/// Flag every pixel at or above the amplifier's saturation level.
pub fn saturation_detection(image: &Array2<f64>, mask_plane: &mut Array2<u16>, amp: &Amplifier) {
    let mut flagged = 0usize;
    for (value, flags) in image.iter().zip(mask_plane.iter_mut()) {
        if *value >= amp.saturation {
            *flags |= mask::SAT;
            flagged += 1;
        }
    }
    if flagged > 0 {
        tracing::debug!(
            "amplifier {}: {flagged} pixels at or above saturation {}",
            amp.name,
            amp.saturation
        );
    }
}

/// Subtract the serial-overscan level from an amplifier's raw frame.
///
/// The overscan region samples the readout bias of this amplifier and
/// readout epoch; its robust level is removed from the whole raw frame so
/// the corrected overscan itself sits at zero. Returns the subtracted
/// level (the mean of the per-row levels for [`OverscanMethod::MedianPerRow`]).
pub fn overscan_correction(
    image: &mut Array2<f64>,
    amp: &Amplifier,
    method: OverscanMethod,
) -> Result<f64, IsrError> {
    let overscan_bbox = amp.raw_horizontal_overscan_bbox;
    if overscan_bbox.is_empty() {
        return Err(IsrError::InvalidConfiguration(format!(
            "amplifier {} has an empty overscan region",
            amp.name
        )));
    }

    let level = match method {
        OverscanMethod::Median | OverscanMethod::Mean => {
            let samples: Vec<f64> = image
                .slice(s![overscan_bbox.y_range(), overscan_bbox.x_range()])
                .iter()
                .copied()
                .collect();
            let level = match method {
                OverscanMethod::Median => stats::median(&samples).map_err(IsrError::Stats)?,
                _ => samples.iter().sum::<f64>() / samples.len() as f64,
            };
            *image -= level;
            level
        }
        OverscanMethod::MedianPerRow => {
            let mut level_sum = 0.0;
            for y in overscan_bbox.y_range() {
                let samples: Vec<f64> = image
                    .slice(s![y..y + 1, overscan_bbox.x_range()])
                    .iter()
                    .copied()
                    .collect();
                let level = stats::median(&samples).map_err(IsrError::Stats)?;
                image.slice_mut(s![y..y + 1, ..]).mapv_inplace(|v| v - level);
                level_sum += level;
            }
            level_sum / overscan_bbox.height as f64
        }
    };

    tracing::debug!("amplifier {}: overscan level {level:.3} ADU", amp.name);
    Ok(level)
}

/// Apply the amplifier's linearity model to every pixel.
pub fn linearize(image: &mut Array2<f64>, amp: &Amplifier) {
    image.mapv_inplace(|v| amp.linearity.apply(v));
}

/// Run the amplifier-local pass for one raw frame.
pub fn correct_amp(
    amp: &Amplifier,
    raw: RawAmpFrame,
    config: &IsrConfig,
) -> Result<ProcessedAmpFrame, IsrError> {
    let expected = (amp.raw_bbox.height, amp.raw_bbox.width);
    if raw.image.dim() != expected {
        return Err(IsrError::GeometryMismatch {
            stage: "amplifier-local",
            expected,
            actual: raw.image.dim(),
        });
    }

    let mut image = raw.image;
    let mut mask_plane = Array2::zeros(expected);

    // Saturation must be detected before any level shift moves pixels
    // away from the hardware ceiling.
    saturation_detection(&image, &mut mask_plane, amp);
    overscan_correction(&mut image, amp, config.overscan_method)?;
    if config.do_linearize {
        linearize(&mut image, amp);
    }

    Ok(ProcessedAmpFrame {
        name: raw.name,
        image,
        mask: mask_plane,
    })
}

/// Run the amplifier-local pass for all frames in parallel.
///
/// Frames are matched to amplifiers by name; an unknown name is fatal.
/// The returned vector is the synchronization barrier before assembly.
pub fn correct_amps_parallel(
    detector: &Detector,
    frames: Vec<RawAmpFrame>,
    config: &IsrConfig,
) -> Result<Vec<ProcessedAmpFrame>, IsrError> {
    frames
        .into_par_iter()
        .map(|frame| {
            let amp = detector.amplifier(&frame.name)?;
            correct_amp(amp, frame, config)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ccdgeom::ccd250;

    fn flat_raw(amp: &Amplifier, data: f64, overscan: f64) -> RawAmpFrame {
        let mut image = Array2::from_elem((amp.raw_bbox.height, amp.raw_bbox.width), data);
        let bbox = amp.raw_horizontal_overscan_bbox;
        image
            .slice_mut(s![bbox.y_range(), bbox.x_range()])
            .fill(overscan);
        RawAmpFrame {
            name: amp.name.clone(),
            image,
        }
    }

    #[test]
    fn test_overscan_drives_level_to_zero() {
        let detector = ccd250::detector().unwrap();
        let amp = detector.amplifier("00").unwrap();
        let mut raw = flat_raw(amp, 1000.0, 1000.4);

        let level = overscan_correction(&mut raw.image, amp, OverscanMethod::Median).unwrap();
        assert_abs_diff_eq!(level, 1000.4, epsilon = 1e-9);

        let bbox = amp.raw_horizontal_overscan_bbox;
        let overscan_mean = raw
            .image
            .slice(s![bbox.y_range(), bbox.x_range()])
            .mean()
            .unwrap();
        assert_abs_diff_eq!(overscan_mean, 0.0, epsilon = 0.5);

        let data_bbox = amp.raw_data_bbox;
        let data_mean = raw
            .image
            .slice(s![data_bbox.y_range(), data_bbox.x_range()])
            .mean()
            .unwrap();
        assert_abs_diff_eq!(data_mean, -0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_per_row_overscan() {
        let detector = ccd250::detector().unwrap();
        let amp = detector.amplifier("00").unwrap();
        let mut raw = flat_raw(amp, 500.0, 0.0);
        // Give each row a different overscan level.
        let bbox = amp.raw_horizontal_overscan_bbox;
        for y in bbox.y_range() {
            raw.image
                .slice_mut(s![y..y + 1, bbox.x_range()])
                .fill(10.0 + y as f64);
        }

        overscan_correction(&mut raw.image, amp, OverscanMethod::MedianPerRow).unwrap();
        for y in [0usize, 100, 2001] {
            assert_abs_diff_eq!(
                raw.image[[y, amp.raw_data_bbox.x0]],
                500.0 - (10.0 + y as f64),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_saturation_flagging() {
        let detector = ccd250::detector().unwrap();
        let amp = detector.amplifier("00").unwrap();
        let mut raw = flat_raw(amp, 1000.0, 1000.0);
        raw.image[[5, 15]] = 70000.0;
        raw.image[[6, 15]] = 65535.0; // exactly at the ceiling counts too

        let mut mask_plane = Array2::zeros(raw.image.dim());
        saturation_detection(&raw.image, &mut mask_plane, amp);
        assert_eq!(mask_plane[[5, 15]], mask::SAT);
        assert_eq!(mask_plane[[6, 15]], mask::SAT);
        assert_eq!(mask_plane[[0, 0]], 0);
    }

    #[test]
    fn test_parallel_pass_matches_serial() {
        let detector = ccd250::detector().unwrap();
        let config = IsrConfig::default();
        let frames: Vec<RawAmpFrame> = detector
            .amplifiers()
            .iter()
            .map(|amp| flat_raw(amp, 1200.0, 1199.5))
            .collect();

        let processed = correct_amps_parallel(&detector, frames, &config).unwrap();
        assert_eq!(processed.len(), 16);
        for frame in &processed {
            let amp = detector.amplifier(&frame.name).unwrap();
            let data_bbox = amp.raw_data_bbox;
            let mean = frame
                .image
                .slice(s![data_bbox.y_range(), data_bbox.x_range()])
                .mean()
                .unwrap();
            assert_abs_diff_eq!(mean, 0.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_unknown_amplifier_name_fatal() {
        let detector = ccd250::detector().unwrap();
        let amp = detector.amplifier("00").unwrap();
        let mut raw = flat_raw(amp, 1000.0, 1000.0);
        raw.name = "nonsense".to_string();
        let result = correct_amps_parallel(&detector, vec![raw], &IsrConfig::default());
        assert!(matches!(result, Err(IsrError::Geometry(_))));
    }
}
