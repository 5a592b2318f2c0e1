//! Common utilities for detrend integration tests.

use ndarray::{s, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use ccdgeom::{Amplifier, Detector, LinearityModel, ReadoutCorner, Region};
use detrend::{Exposure, ExposureMetadata, ImageType, RawAmpFrame};

// Per-amplifier layout of the small test sensor.
const AMP_WIDTH: usize = 16;
const AMP_HEIGHT: usize = 12;
const PRESCAN: usize = 2;
const H_OVERSCAN: usize = 4;
const V_OVERSCAN: usize = 3;
const RAW_WIDTH: usize = PRESCAN + AMP_WIDTH + H_OVERSCAN;
const RAW_HEIGHT: usize = AMP_HEIGHT + V_OVERSCAN;

fn test_amp(col: usize, row: usize) -> Amplifier {
    // Mirror the real sensor's layout rules at small scale: the bottom
    // row reads out unflipped with mirrored placement, the top row is
    // flipped in both axes.
    let (x0, flip) = if row == 0 {
        ((1 - col) * AMP_WIDTH, false)
    } else {
        (col * AMP_WIDTH, true)
    };
    Amplifier {
        name: format!("{col}{row}"),
        index: (col as u8, row as u8),
        bbox: Region::new(x0, row * AMP_HEIGHT, AMP_WIDTH, AMP_HEIGHT),
        raw_bbox: Region::new(0, 0, RAW_WIDTH, RAW_HEIGHT),
        raw_data_bbox: Region::new(PRESCAN, 0, AMP_WIDTH, AMP_HEIGHT),
        raw_horizontal_overscan_bbox: Region::new(PRESCAN + AMP_WIDTH, 0, H_OVERSCAN, AMP_HEIGHT),
        raw_vertical_overscan_bbox: Region::new(PRESCAN, AMP_HEIGHT, AMP_WIDTH, V_OVERSCAN),
        raw_xy_offset: (col * RAW_WIDTH, row * RAW_HEIGHT),
        readout_corner: ReadoutCorner::LowerLeft,
        flip_x: flip,
        flip_y: flip,
        gain: 1.5 + 0.1 * (col + 2 * row) as f64,
        read_noise: 5.0,
        saturation: 65535.0,
        linearity: LinearityModel::Proportional {
            threshold: 0.0,
            max_adu: 65535.0,
        },
    }
}

/// A four-amplifier sensor small enough for fast end-to-end runs.
pub fn test_detector() -> Detector {
    let amps = vec![
        test_amp(0, 0),
        test_amp(1, 0),
        test_amp(0, 1),
        test_amp(1, 1),
    ];
    Detector::new(
        "test",
        "test-0001",
        Region::new(0, 0, 2 * AMP_WIDTH, 2 * AMP_HEIGHT),
        0.01,
        None,
        amps,
    )
    .unwrap()
}

/// A raw amplifier frame with constant data and overscan levels.
pub fn flat_raw_frame(amp: &Amplifier, data: f64, overscan: f64) -> RawAmpFrame {
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

/// One raw frame per amplifier, all with the same levels.
pub fn flat_raw_frames(detector: &Detector, data: f64, overscan: f64) -> Vec<RawAmpFrame> {
    detector
        .amplifiers()
        .iter()
        .map(|amp| flat_raw_frame(amp, data, overscan))
        .collect()
}

/// Raw frames with seeded Gaussian-ish noise on top of the constant levels.
pub fn noisy_raw_frames(
    detector: &Detector,
    data: f64,
    overscan: f64,
    sigma: f64,
    seed: u64,
) -> Vec<RawAmpFrame> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    detector
        .amplifiers()
        .iter()
        .map(|amp| {
            let mut frame = flat_raw_frame(amp, data, overscan);
            frame
                .image
                .mapv_inplace(|v| v + rng.gen_range(-sigma..sigma));
            frame
        })
        .collect()
}

/// A uniform calibration exposure matching the detector's trimmed shape.
pub fn uniform_exposure(
    detector: &Detector,
    value: f64,
    exp_time: f64,
    image_type: ImageType,
) -> Exposure {
    let bbox = detector.bbox();
    Exposure::from_image(
        Array2::from_elem((bbox.height, bbox.width), value),
        ExposureMetadata {
            exp_time,
            image_type,
            ..Default::default()
        },
    )
}

/// Metadata for a science exposure.
pub fn science_metadata(exp_time: f64, visit: u64) -> ExposureMetadata {
    ExposureMetadata {
        exp_time,
        object: "TEST-FIELD".to_string(),
        filter: "SDSSR".to_string(),
        visit,
        image_type: ImageType::Object,
        ..Default::default()
    }
}
