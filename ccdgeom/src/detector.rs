//! Detector model aggregating an ordered set of amplifiers.

use serde::{Deserialize, Serialize};

use crate::amplifier::Amplifier;
use crate::error::GeometryError;
use crate::region::Region;

/// Rigid-body placement of a detector in the focal-plane reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Offset of the detector reference point, in millimetres.
    pub offset_mm: (f64, f64),
    /// Rotation about the detector normal, in degrees.
    pub yaw_deg: f64,
}

/// Affine map from one amplifier's raw-frame coordinates to trimmed
/// focal-plane coordinates: a translation plus optional X/Y mirrors.
///
/// Amplifiers are axis-aligned relative to each other, so no rotation or
/// scale is involved.
#[derive(Debug, Clone, Copy)]
pub struct RawToTrimmed {
    data_bbox: Region,
    target: Region,
    flip_x: bool,
    flip_y: bool,
}

impl RawToTrimmed {
    /// Map a raw-frame pixel to its trimmed focal-plane position.
    ///
    /// The pixel must lie inside the amplifier's raw data region; other
    /// raw pixels (overscan, extended register) have no trimmed
    /// counterpart and yield [`GeometryError::OutOfBounds`].
    pub fn apply(&self, x: usize, y: usize) -> Result<(usize, usize), GeometryError> {
        if !self.data_bbox.contains(x, y) {
            return Err(GeometryError::OutOfBounds { x, y });
        }
        let mut u = x - self.data_bbox.x0;
        let mut v = y - self.data_bbox.y0;
        if self.flip_x {
            u = self.data_bbox.width - 1 - u;
        }
        if self.flip_y {
            v = self.data_bbox.height - 1 - v;
        }
        Ok((self.target.x0 + u, self.target.y0 + v))
    }
}

/// A physical sensor: an ordered set of amplifiers plus overall geometry.
///
/// Constructed once at configuration time from a declarative layout table
/// and shared immutably by every processing invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detector {
    name: String,
    serial: String,
    bbox: Region,
    pixel_size_mm: f64,
    placement: Option<Placement>,
    amplifiers: Vec<Amplifier>,
}

impl Detector {
    /// Build a detector, checking layout invariants.
    ///
    /// Each amplifier is validated individually, and the trimmed
    /// bounding boxes must exactly tile `bbox` with no gaps or overlaps.
    pub fn new(
        name: impl Into<String>,
        serial: impl Into<String>,
        bbox: Region,
        pixel_size_mm: f64,
        placement: Option<Placement>,
        amplifiers: Vec<Amplifier>,
    ) -> Result<Self, GeometryError> {
        let detector = Self {
            name: name.into(),
            serial: serial.into(),
            bbox,
            pixel_size_mm,
            placement,
            amplifiers,
        };
        detector.validate()?;
        Ok(detector)
    }

    /// Detector name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Manufacturer serial number.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Overall trimmed pixel bounding box.
    pub fn bbox(&self) -> Region {
        self.bbox
    }

    /// Physical pixel pitch in millimetres.
    pub fn pixel_size_mm(&self) -> f64 {
        self.pixel_size_mm
    }

    /// Rigid-body placement in the focal plane, if specified.
    pub fn placement(&self) -> Option<Placement> {
        self.placement
    }

    /// The ordered list of amplifiers.
    pub fn amplifiers(&self) -> &[Amplifier] {
        &self.amplifiers
    }

    /// Look up an amplifier by name.
    pub fn amplifier(&self, name: &str) -> Result<&Amplifier, GeometryError> {
        self.amplifiers
            .iter()
            .find(|amp| amp.name == name)
            .ok_or_else(|| GeometryError::UnknownAmplifier {
                name: name.to_string(),
            })
    }

    /// The amplifier owning a trimmed focal-plane point.
    pub fn amplifier_at(&self, x: usize, y: usize) -> Result<&Amplifier, GeometryError> {
        self.amplifiers
            .iter()
            .find(|amp| amp.bbox.contains(x, y))
            .ok_or(GeometryError::OutOfBounds { x, y })
    }

    /// The amplifier owning an entire trimmed region.
    ///
    /// Regions spanning amplifier boundaries have no single owner and
    /// yield [`GeometryError::RegionNotOwned`].
    pub fn amplifier_for_region(&self, region: &Region) -> Result<&Amplifier, GeometryError> {
        self.amplifiers
            .iter()
            .find(|amp| amp.bbox.contains_region(region))
            .ok_or(GeometryError::RegionNotOwned {
                x0: region.x0,
                y0: region.y0,
                width: region.width,
                height: region.height,
            })
    }

    /// The raw-frame to trimmed focal-plane map for one amplifier.
    pub fn raw_to_trimmed(&self, amp: &Amplifier) -> RawToTrimmed {
        RawToTrimmed {
            data_bbox: amp.raw_data_bbox,
            target: amp.bbox,
            flip_x: amp.flip_x,
            flip_y: amp.flip_y,
        }
    }

    fn validate(&self) -> Result<(), GeometryError> {
        let bad = |reason: String| GeometryError::BadLayout {
            detector: self.name.clone(),
            reason,
        };

        if self.amplifiers.is_empty() {
            return Err(bad("detector has no amplifiers".to_string()));
        }

        for amp in &self.amplifiers {
            amp.validate()?;
            if !self.bbox.contains_region(&amp.bbox) {
                return Err(bad(format!(
                    "amplifier {} extends outside the detector bounding box",
                    amp.name
                )));
            }
        }

        // Contained + pairwise disjoint + areas summing to the full bbox
        // is an exact tiling.
        let mut total_area = 0usize;
        for (i, amp) in self.amplifiers.iter().enumerate() {
            total_area += amp.bbox.area();
            for other in &self.amplifiers[i + 1..] {
                if amp.bbox.overlaps(&other.bbox) {
                    return Err(bad(format!(
                        "amplifiers {} and {} overlap in trimmed coordinates",
                        amp.name, other.name
                    )));
                }
                if amp.name == other.name {
                    return Err(bad(format!("duplicate amplifier name {}", amp.name)));
                }
            }
        }
        if total_area != self.bbox.area() {
            return Err(bad(format!(
                "amplifiers cover {} pixels but the detector has {}",
                total_area,
                self.bbox.area()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amplifier::{LinearityModel, ReadoutCorner};

    fn quad_amp(name: &str, col: u8, row: u8, flip: bool) -> Amplifier {
        Amplifier {
            name: name.to_string(),
            index: (col, row),
            bbox: Region::new(col as usize * 4, row as usize * 4, 4, 4),
            raw_bbox: Region::new(0, 0, 8, 6),
            raw_data_bbox: Region::new(1, 0, 4, 4),
            raw_horizontal_overscan_bbox: Region::new(5, 0, 3, 4),
            raw_vertical_overscan_bbox: Region::new(1, 4, 4, 2),
            raw_xy_offset: (col as usize * 8, row as usize * 6),
            readout_corner: ReadoutCorner::LowerLeft,
            flip_x: flip,
            flip_y: flip,
            gain: 1.0,
            read_noise: 5.0,
            saturation: 65535.0,
            linearity: LinearityModel::Proportional {
                threshold: 0.0,
                max_adu: 65535.0,
            },
        }
    }

    fn quad_detector() -> Detector {
        let amps = vec![
            quad_amp("00", 0, 0, false),
            quad_amp("10", 1, 0, false),
            quad_amp("01", 0, 1, true),
            quad_amp("11", 1, 1, true),
        ];
        Detector::new("quad", "test-0001", Region::new(0, 0, 8, 8), 0.01, None, amps).unwrap()
    }

    #[test]
    fn test_tiling_accepted() {
        let det = quad_detector();
        assert_eq!(det.amplifiers().len(), 4);
    }

    #[test]
    fn test_gap_rejected() {
        let mut amps = vec![
            quad_amp("00", 0, 0, false),
            quad_amp("10", 1, 0, false),
            quad_amp("01", 0, 1, true),
        ];
        amps.truncate(3);
        let result = Detector::new("gap", "x", Region::new(0, 0, 8, 8), 0.01, None, amps);
        assert!(matches!(result, Err(GeometryError::BadLayout { .. })));
    }

    #[test]
    fn test_overlap_rejected() {
        let mut amps = vec![
            quad_amp("00", 0, 0, false),
            quad_amp("10", 1, 0, false),
            quad_amp("01", 0, 1, true),
            quad_amp("11", 1, 1, true),
        ];
        amps[1].bbox = Region::new(3, 0, 4, 4);
        let result = Detector::new("overlap", "x", Region::new(0, 0, 8, 8), 0.01, None, amps);
        assert!(matches!(result, Err(GeometryError::BadLayout { .. })));
    }

    #[test]
    fn test_amplifier_at() {
        let det = quad_detector();
        assert_eq!(det.amplifier_at(0, 0).unwrap().name, "00");
        assert_eq!(det.amplifier_at(5, 2).unwrap().name, "10");
        assert_eq!(det.amplifier_at(2, 6).unwrap().name, "01");
        assert!(matches!(
            det.amplifier_at(8, 0),
            Err(GeometryError::OutOfBounds { x: 8, y: 0 })
        ));
    }

    #[test]
    fn test_amplifier_for_region() {
        let det = quad_detector();
        let inside = Region::new(1, 1, 2, 2);
        assert_eq!(det.amplifier_for_region(&inside).unwrap().name, "00");

        let spanning = Region::new(3, 0, 4, 2);
        assert!(matches!(
            det.amplifier_for_region(&spanning),
            Err(GeometryError::RegionNotOwned { .. })
        ));
    }

    #[test]
    fn test_raw_to_trimmed_no_flip() {
        let det = quad_detector();
        let amp = det.amplifier("10").unwrap();
        let map = det.raw_to_trimmed(amp);
        // raw data origin maps to the amplifier's trimmed origin
        assert_eq!(map.apply(1, 0).unwrap(), (4, 0));
        assert_eq!(map.apply(4, 3).unwrap(), (7, 3));
        // overscan pixels have no trimmed counterpart
        assert!(map.apply(6, 0).is_err());
    }

    #[test]
    fn test_raw_to_trimmed_with_flips() {
        let det = quad_detector();
        let amp = det.amplifier("11").unwrap();
        let map = det.raw_to_trimmed(amp);
        // both mirrors: raw data origin lands at the far corner
        assert_eq!(map.apply(1, 0).unwrap(), (7, 7));
        assert_eq!(map.apply(4, 3).unwrap(), (4, 4));
    }
}
