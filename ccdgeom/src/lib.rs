//! Detector geometry for multi-amplifier CCD sensors.
//!
//! This crate describes how raw per-amplifier readouts relate to the
//! trimmed focal-plane image: per-amplifier data and overscan regions,
//! mirror flips, readout corners, and the calibration constants (gain,
//! read noise, saturation) the signature-removal pipeline needs.
//!
//! Geometry is pure data: it is compiled from a declarative table at
//! startup ([`ccd250::detector`]), validated once, and shared immutably
//! by every processing invocation. Queries are pure functions over these
//! value structs.

pub mod amplifier;
pub mod ccd250;
pub mod detector;
pub mod error;
pub mod filter;
pub mod region;

// Re-export commonly used types
pub use amplifier::{Amplifier, LinearityModel, ReadoutCorner};
pub use detector::{Detector, Placement, RawToTrimmed};
pub use error::GeometryError;
pub use filter::{FilterBand, FilterTable};
pub use region::Region;
