//! Image-level corrections on the assembled exposure.

use ndarray::{s, Array2, Zip};

use ccdgeom::Detector;

use crate::calibration::FringeSet;
use crate::error::IsrError;
use crate::exposure::{mask, Exposure};

/// Convolution kernel for the brighter-fatter correction.
#[derive(Debug, Clone)]
pub struct BrighterFatterKernel {
    kernel: Array2<f64>,
}

impl BrighterFatterKernel {
    /// Wrap a measured kernel; both dimensions must be odd so the kernel
    /// has a central pixel.
    pub fn new(kernel: Array2<f64>) -> Result<Self, IsrError> {
        let (rows, cols) = kernel.dim();
        if rows % 2 == 0 || cols % 2 == 0 {
            return Err(IsrError::InvalidConfiguration(format!(
                "brighter-fatter kernel must have odd dimensions, got {rows}x{cols}"
            )));
        }
        Ok(Self { kernel })
    }

    /// The kernel array.
    pub fn array(&self) -> &Array2<f64> {
        &self.kernel
    }
}

fn check_shape(
    stage: &'static str,
    exposure: &Exposure,
    calib: &Exposure,
) -> Result<(), IsrError> {
    if calib.dim() != exposure.dim() {
        return Err(IsrError::GeometryMismatch {
            stage,
            expected: exposure.dim(),
            actual: calib.dim(),
        });
    }
    Ok(())
}

/// Subtract a bias frame pixel-wise.
pub fn bias_correction(exposure: &mut Exposure, bias: &Exposure) -> Result<(), IsrError> {
    check_shape("bias", exposure, bias)?;
    exposure.image -= &bias.image;
    tracing::debug!("subtracted bias frame");
    Ok(())
}

/// Subtract a dark frame scaled by the exposure-time ratio.
///
/// Darks are normalized to a 1-second reference at ingestion, so the
/// scale is the science integration time divided by the dark frame's
/// recorded time.
pub fn dark_correction(exposure: &mut Exposure, dark: &Exposure) -> Result<(), IsrError> {
    check_shape("dark", exposure, dark)?;
    let dark_time = dark.metadata.exp_time;
    if !dark_time.is_finite() || dark_time <= 0.0 {
        return Err(IsrError::InvalidConfiguration(format!(
            "dark frame exposure time must be positive, got {dark_time}"
        )));
    }
    let scale = exposure.metadata.exp_time / dark_time;
    Zip::from(&mut exposure.image)
        .and(&dark.image)
        .for_each(|pixel, &d| *pixel -= d * scale);
    tracing::debug!("subtracted dark frame with scale {scale:.3}");
    Ok(())
}

/// Divide by a unit-mean flat field.
///
/// Pixels where the flat is zero or non-finite cannot be corrected; they
/// are masked bad and set to NaN for the interpolation stages.
pub fn flat_correction(exposure: &mut Exposure, flat: &Exposure) -> Result<(), IsrError> {
    check_shape("flat", exposure, flat)?;
    let mut uncorrectable = 0usize;
    Zip::from(&mut exposure.image)
        .and(&mut exposure.variance)
        .and(&mut exposure.mask)
        .and(&flat.image)
        .for_each(|pixel, variance, flags, &f| {
            if f > 0.0 && f.is_finite() {
                *pixel /= f;
                *variance /= f * f;
            } else {
                *pixel = f64::NAN;
                *flags |= mask::BAD;
                uncorrectable += 1;
            }
        });
    if uncorrectable > 0 {
        tracing::warn!("flat correction left {uncorrectable} uncorrectable pixels");
    }
    tracing::debug!("divided by flat field");
    Ok(())
}

/// Subtract the scaled fringe template.
pub fn fringe_correction(exposure: &mut Exposure, fringe: &FringeSet) -> Result<(), IsrError> {
    check_shape("fringe", exposure, &fringe.template)?;
    let scale = fringe.scale;
    Zip::from(&mut exposure.image)
        .and(&fringe.template.image)
        .for_each(|pixel, &t| *pixel -= t * scale);
    tracing::debug!("subtracted fringe template with scale {scale:.4}");
    Ok(())
}

/// Zero-padded convolution preserving the input shape.
fn convolve_same(image: &Array2<f64>, kernel: &Array2<f64>) -> Array2<f64> {
    let (img_rows, img_cols) = image.dim();
    let (ker_rows, ker_cols) = kernel.dim();
    let pad_rows = ker_rows / 2;
    let pad_cols = ker_cols / 2;

    let mut output = Array2::zeros((img_rows, img_cols));
    for i in 0..img_rows {
        for j in 0..img_cols {
            let mut sum = 0.0;
            for ki in 0..ker_rows {
                for kj in 0..ker_cols {
                    let row = i as isize + ki as isize - pad_rows as isize;
                    let col = j as isize + kj as isize - pad_cols as isize;
                    if row >= 0 && row < img_rows as isize && col >= 0 && col < img_cols as isize {
                        sum += image[[row as usize, col as usize]] * kernel[[ki, kj]];
                    }
                }
            }
            output[[i, j]] = sum;
        }
    }
    output
}

/// Central-difference gradients along rows and columns.
///
/// Interior points use central differences, edges one-sided differences,
/// so the output has the same shape as the input.
fn gradient(image: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
    let (rows, cols) = image.dim();
    let mut dy = Array2::zeros((rows, cols));
    let mut dx = Array2::zeros((rows, cols));

    for i in 0..rows {
        for j in 0..cols {
            dy[[i, j]] = if rows == 1 {
                0.0
            } else if i == 0 {
                image[[1, j]] - image[[0, j]]
            } else if i == rows - 1 {
                image[[rows - 1, j]] - image[[rows - 2, j]]
            } else {
                (image[[i + 1, j]] - image[[i - 1, j]]) / 2.0
            };
            dx[[i, j]] = if cols == 1 {
                0.0
            } else if j == 0 {
                image[[i, 1]] - image[[i, 0]]
            } else if j == cols - 1 {
                image[[i, cols - 1]] - image[[i, cols - 2]]
            } else {
                (image[[i, j + 1]] - image[[i, j - 1]]) / 2.0
            };
        }
    }
    (dy, dx)
}

/// Iterative brighter-fatter correction.
///
/// Charge diffusion redistributes flux from bright pixels to their
/// neighbors in a signal-dependent way described by the measured kernel.
/// The inverse is found by fixed-point iteration: starting from the
/// observed image, a flux-redistribution estimate is computed from the
/// kernel-smoothed image's gradients and re-added to the observation
/// until the update falls below `threshold` or `max_iter` is reached.
///
/// With `apply_gain` the iteration runs in electrons, converting each
/// amplifier region by its own gain before and after.
pub fn brighter_fatter_correction(
    exposure: &mut Exposure,
    kernel: &BrighterFatterKernel,
    max_iter: usize,
    threshold: f64,
    apply_gain: bool,
    detector: &Detector,
) -> Result<(), IsrError> {
    if max_iter == 0 {
        return Err(IsrError::InvalidConfiguration(
            "brighter-fatter iteration cap must be positive".to_string(),
        ));
    }
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(IsrError::InvalidConfiguration(format!(
            "brighter-fatter threshold must be positive, got {threshold}"
        )));
    }

    if apply_gain {
        for amp in detector.amplifiers() {
            exposure
                .image
                .slice_mut(s![amp.bbox.y_range(), amp.bbox.x_range()])
                .mapv_inplace(|v| v * amp.gain);
        }
    }

    let observed = exposure.image.clone();
    let mut template = observed.clone();
    let mut previous = template.clone();
    let mut converged = false;

    for iteration in 0..max_iter {
        let smoothed = convolve_same(&template, kernel.array());
        let (gy_smoothed, gx_smoothed) = gradient(&smoothed);
        let (gy_template, gx_template) = gradient(&template);
        let (gyy, _) = gradient(&gy_smoothed);
        let (_, gxx) = gradient(&gx_smoothed);

        // Flux moved into a pixel is half the divergence of the
        // signal-weighted kernel gradient field.
        Zip::indexed(&mut template).for_each(|(i, j), value| {
            let first = gx_smoothed[[i, j]] * gx_template[[i, j]]
                + gy_smoothed[[i, j]] * gy_template[[i, j]];
            let second = observed[[i, j]] * (gxx[[i, j]] + gyy[[i, j]]);
            *value = observed[[i, j]] + 0.5 * (first + second);
        });

        let max_delta = Zip::from(&template)
            .and(&previous)
            .fold(0.0f64, |acc, &t, &p| acc.max((t - p).abs()));
        if max_delta < threshold {
            tracing::debug!(
                "brighter-fatter converged after {} iterations (delta {max_delta:.3})",
                iteration + 1
            );
            converged = true;
            break;
        }
        previous.assign(&template);
    }
    if !converged {
        tracing::warn!("brighter-fatter correction did not converge within {max_iter} iterations");
    }

    exposure.image.assign(&template);

    if apply_gain {
        for amp in detector.amplifiers() {
            exposure
                .image
                .slice_mut(s![amp.bbox.y_range(), amp.bbox.x_range()])
                .mapv_inplace(|v| v / amp.gain);
        }
    }

    Ok(())
}
