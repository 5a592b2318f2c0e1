//! Defect masking and interpolation over unusable pixels.
//!
//! Interpolation runs along the serial (row) direction: each run of
//! flagged pixels is replaced by a linear ramp between its nearest good
//! neighbors. Runs touching an image edge take the value of the single
//! good neighbor; a fully flagged row falls back to zero. Every replaced
//! pixel is flagged `INTRP`.

use ccdgeom::Region;

use crate::error::IsrError;
use crate::exposure::{mask, Exposure};

/// Flag known defect regions as bad.
///
/// Regions are clipped to the exposure bounds; a defect list can be
/// shared across sensors whose trim differs slightly.
pub fn mask_defects(exposure: &mut Exposure, defects: &[Region]) {
    let (height, width) = exposure.dim();
    let frame = Region::new(0, 0, width, height);
    for defect in defects {
        let Some(clipped) = defect.intersect(&frame) else {
            continue;
        };
        for y in clipped.y_range() {
            for x in clipped.x_range() {
                exposure.mask[[y, x]] |= mask::BAD;
            }
        }
    }
}

/// Flag any non-finite pixel as bad.
///
/// Returns the number of pixels flagged.
pub fn mask_non_finite(exposure: &mut Exposure) -> usize {
    let mut flagged = 0usize;
    ndarray::Zip::from(&exposure.image)
        .and(&mut exposure.mask)
        .for_each(|&pixel, flags| {
            if !pixel.is_finite() {
                *flags |= mask::BAD;
                flagged += 1;
            }
        });
    flagged
}

/// Interpolate over every pixel carrying any of `bits`.
///
/// Works row by row along the serial direction. Interpolated pixels are
/// flagged `INTRP`; the selecting bits are left in place so downstream
/// consumers can still see why a pixel was replaced.
pub fn interpolate_masked(exposure: &mut Exposure, bits: u16) -> Result<(), IsrError> {
    exposure.check_planes("interpolate")?;
    let (height, width) = exposure.dim();

    for y in 0..height {
        let mut x = 0;
        while x < width {
            if exposure.mask[[y, x]] & bits == 0 {
                x += 1;
                continue;
            }

            // Found the start of a flagged run; find its end.
            let start = x;
            while x < width && exposure.mask[[y, x]] & bits != 0 {
                x += 1;
            }
            let end = x; // exclusive

            let left = if start > 0 {
                Some(exposure.image[[y, start - 1]])
            } else {
                None
            };
            let right = if end < width {
                Some(exposure.image[[y, end]])
            } else {
                None
            };

            for i in start..end {
                let value = match (left, right) {
                    (Some(l), Some(r)) => {
                        // Linear ramp between the bracketing good pixels.
                        let span = (end - start + 1) as f64;
                        let frac = (i - start + 1) as f64 / span;
                        l + (r - l) * frac
                    }
                    (Some(l), None) => l,
                    (None, Some(r)) => r,
                    (None, None) => 0.0,
                };
                exposure.image[[y, i]] = value;
                exposure.mask[[y, i]] |= mask::INTRP;
            }
        }
    }
    Ok(())
}

/// Interpolate over remaining non-finite pixels.
///
/// Any NaN or infinity that survived the earlier stages (for example an
/// uncorrectable flat-field pixel) is flagged bad and replaced.
pub fn interpolate_non_finite(exposure: &mut Exposure) -> Result<(), IsrError> {
    let flagged = mask_non_finite(exposure);
    if flagged > 0 {
        tracing::debug!("interpolating over {flagged} non-finite pixels");
        // Restrict to the freshly flagged pixels by value, not by BAD
        // alone: defect pixels were already interpolated.
        interpolate_over_non_finite_values(exposure)?;
    }
    Ok(())
}

fn interpolate_over_non_finite_values(exposure: &mut Exposure) -> Result<(), IsrError> {
    exposure.check_planes("interpolate")?;
    let (height, width) = exposure.dim();

    for y in 0..height {
        let mut x = 0;
        while x < width {
            if exposure.image[[y, x]].is_finite() {
                x += 1;
                continue;
            }
            let start = x;
            while x < width && !exposure.image[[y, x]].is_finite() {
                x += 1;
            }
            let end = x;

            let left = (start > 0).then(|| exposure.image[[y, start - 1]]);
            let right = (end < width).then(|| exposure.image[[y, end]]);
            for i in start..end {
                let value = match (left, right) {
                    (Some(l), Some(r)) => {
                        let span = (end - start + 1) as f64;
                        let frac = (i - start + 1) as f64 / span;
                        l + (r - l) * frac
                    }
                    (Some(l), None) => l,
                    (None, Some(r)) => r,
                    (None, None) => 0.0,
                };
                exposure.image[[y, i]] = value;
                exposure.mask[[y, i]] |= mask::INTRP;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::ExposureMetadata;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn ramp_exposure(height: usize, width: usize) -> Exposure {
        Exposure::from_image(
            Array2::from_shape_fn((height, width), |(_, x)| x as f64),
            ExposureMetadata::default(),
        )
    }

    #[test]
    fn test_mask_defects_clipped() {
        let mut exposure = ramp_exposure(10, 10);
        let defects = [Region::new(2, 2, 3, 1), Region::new(8, 8, 10, 10)];
        mask_defects(&mut exposure, &defects);
        assert_eq!(exposure.mask[[2, 2]], mask::BAD);
        assert_eq!(exposure.mask[[2, 4]], mask::BAD);
        assert_eq!(exposure.mask[[2, 5]], 0);
        assert_eq!(exposure.mask[[9, 9]], mask::BAD); // clipped corner
    }

    #[test]
    fn test_interpolation_linear_ramp() {
        let mut exposure = ramp_exposure(2, 10);
        // Damage a run in the middle of row 0.
        for x in 3..6 {
            exposure.image[[0, x]] = 9999.0;
            exposure.mask[[0, x]] |= mask::BAD;
        }
        interpolate_masked(&mut exposure, mask::BAD).unwrap();

        // Neighbors are 2.0 and 6.0; the ramp restores the original values.
        assert_abs_diff_eq!(exposure.image[[0, 3]], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(exposure.image[[0, 4]], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(exposure.image[[0, 5]], 5.0, epsilon = 1e-12);
        for x in 3..6 {
            assert_eq!(exposure.mask[[0, x]] & mask::INTRP, mask::INTRP);
        }
        // The untouched row is unchanged and unflagged.
        assert_eq!(exposure.mask[[1, 4]], 0);
    }

    #[test]
    fn test_interpolation_at_edges() {
        let mut exposure = ramp_exposure(1, 6);
        exposure.mask[[0, 0]] |= mask::SAT;
        exposure.mask[[0, 5]] |= mask::SAT;
        interpolate_masked(&mut exposure, mask::SAT).unwrap();
        // Edge runs take the nearest good neighbor.
        assert_abs_diff_eq!(exposure.image[[0, 0]], 1.0);
        assert_abs_diff_eq!(exposure.image[[0, 5]], 4.0);
    }

    #[test]
    fn test_fully_flagged_row_falls_back_to_zero() {
        let mut exposure = ramp_exposure(1, 4);
        for x in 0..4 {
            exposure.mask[[0, x]] |= mask::BAD;
        }
        interpolate_masked(&mut exposure, mask::BAD).unwrap();
        for x in 0..4 {
            assert_eq!(exposure.image[[0, x]], 0.0);
            assert_eq!(exposure.mask[[0, x]] & mask::INTRP, mask::INTRP);
        }
    }

    #[test]
    fn test_nan_interpolation() {
        let mut exposure = ramp_exposure(1, 8);
        exposure.image[[0, 3]] = f64::NAN;
        exposure.image[[0, 4]] = f64::INFINITY;
        interpolate_non_finite(&mut exposure).unwrap();
        assert!(exposure.image.iter().all(|v| v.is_finite()));
        assert_abs_diff_eq!(exposure.image[[0, 3]], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(exposure.image[[0, 4]], 4.0, epsilon = 1e-12);
        assert_eq!(exposure.mask[[0, 3]] & mask::INTRP, mask::INTRP);
        assert_eq!(exposure.mask[[0, 4]] & mask::BAD, mask::BAD);
    }
}
