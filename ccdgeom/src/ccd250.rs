//! Declarative layout table for the 16-amplifier e2v CCD250-class sensor.
//!
//! The sensor reads out through an 8 column x 2 row grid of amplifiers,
//! each covering 512x2002 trimmed pixels, for an assembled image of
//! 4096x4004. Raw amplifier frames carry a 10-pixel extended register and
//! a 22-pixel serial overscan in X, and a 46-pixel parallel overscan in Y.
//!
//! Gain and read-noise values are per-amplifier measurements from the
//! sensor characterization campaign; linearity is a placeholder
//! proportional model until measured data exists.

use crate::amplifier::{Amplifier, LinearityModel, ReadoutCorner};
use crate::detector::Detector;
use crate::error::GeometryError;
use crate::region::Region;

/// Trimmed data extent of one amplifier, in columns.
pub const AMP_WIDTH: usize = 512;
/// Trimmed data extent of one amplifier, in rows.
pub const AMP_HEIGHT: usize = 2002;
/// Amplifier grid columns.
pub const AMP_COLS: usize = 8;
/// Amplifier grid rows.
pub const AMP_ROWS: usize = 2;

/// Extended-register pixels preceding the data in X.
const PRESCAN: usize = 10;
/// Serial overscan pixels following the data in X.
const H_OVERSCAN: usize = 22;
/// Parallel overscan rows following the data in Y.
const V_OVERSCAN: usize = 46;

/// Full raw frame width: prescan + data + serial overscan.
pub const RAW_WIDTH: usize = PRESCAN + AMP_WIDTH + H_OVERSCAN;
/// Full raw frame height: data + parallel overscan (no vertical prescan).
pub const RAW_HEIGHT: usize = AMP_HEIGHT + V_OVERSCAN;

/// Saturation ceiling in ADU.
pub const SATURATION: f64 = 65535.0;

/// Measured gain in e-/ADU, indexed `[row][col]` of the amplifier grid.
const GAIN: [[f64; AMP_COLS]; AMP_ROWS] = [
    [
        3.707220, 3.724264, 3.758828, 3.794040, 3.724264, 3.776352, 3.758828, 3.776352,
    ],
    [
        3.724264, 3.657009, 3.640573, 3.624284, 3.640573, 3.707220, 3.673594, 3.640573,
    ],
];

/// Measured read noise in e- RMS, indexed `[row][col]`.
const READ_NOISE: [[f64; AMP_COLS]; AMP_ROWS] = [
    [
        7.105902, 6.860052, 7.387405, 7.222204, 7.250763, 7.315250, 7.104838, 7.272336,
    ],
    [
        8.485139, 8.022778, 8.157399, 8.021112, 8.015486, 7.928829, 16.031720, 7.938155,
    ],
];

fn make_amplifier(col: usize, row: usize) -> Amplifier {
    // Bottom-row amplifiers are placed mirror-ordered in X so that the
    // serial direction runs consistently across the assembled image;
    // top-row amplifiers are read out rotated and need both mirrors.
    let bbox = if row == 1 {
        Region::new(col * AMP_WIDTH, AMP_HEIGHT, AMP_WIDTH, AMP_HEIGHT)
    } else {
        Region::new((AMP_COLS - 1 - col) * AMP_WIDTH, 0, AMP_WIDTH, AMP_HEIGHT)
    };
    let flip = row == 1;

    Amplifier {
        name: format!("{col}{row}"),
        index: (col as u8, row as u8),
        bbox,
        raw_bbox: Region::new(0, 0, RAW_WIDTH, RAW_HEIGHT),
        raw_data_bbox: Region::new(PRESCAN, 0, AMP_WIDTH, AMP_HEIGHT),
        raw_horizontal_overscan_bbox: Region::new(PRESCAN + AMP_WIDTH, 0, H_OVERSCAN, AMP_HEIGHT),
        raw_vertical_overscan_bbox: Region::new(PRESCAN, AMP_HEIGHT, AMP_WIDTH, V_OVERSCAN),
        raw_xy_offset: (col * RAW_WIDTH, row * RAW_HEIGHT),
        // Raws are stored in amplifier-native orientation, so every
        // channel reads from the same corner.
        readout_corner: ReadoutCorner::LowerLeft,
        flip_x: flip,
        flip_y: flip,
        gain: GAIN[row][col],
        read_noise: READ_NOISE[row][col],
        saturation: SATURATION,
        linearity: LinearityModel::Proportional {
            threshold: 0.0,
            max_adu: SATURATION,
        },
    }
}

/// Build the full 16-amplifier detector model.
pub fn detector() -> Result<Detector, GeometryError> {
    let mut amplifiers = Vec::with_capacity(AMP_COLS * AMP_ROWS);
    for row in 0..AMP_ROWS {
        for col in 0..AMP_COLS {
            amplifiers.push(make_amplifier(col, row));
        }
    }
    Detector::new(
        "0",
        "abcd1234",
        Region::new(0, 0, AMP_COLS * AMP_WIDTH, AMP_ROWS * AMP_HEIGHT),
        0.01,
        None,
        amplifiers,
    )
}

/// Known bad regions of this sensor, in trimmed pixel coordinates.
///
/// These may be hot-pixel clusters rather than true defects; they are
/// treated as bad until more characterization data exists.
pub fn known_defects() -> Vec<Region> {
    vec![Region::new(3801, 666, 5, 4), Region::new(3934, 582, 3, 8)]
}
