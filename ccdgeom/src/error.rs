use thiserror::Error;

/// Errors from detector geometry queries and construction.
///
/// These are configuration or programming faults, not transient runtime
/// conditions; callers should not retry them.
#[derive(Error, Debug)]
pub enum GeometryError {
    /// A trimmed-coordinate query fell outside every amplifier.
    #[error("point ({x}, {y}) is outside every amplifier")]
    OutOfBounds {
        /// Column of the query point.
        x: usize,
        /// Row of the query point.
        y: usize,
    },

    /// A region query was not owned by a single amplifier.
    #[error("region at ({x0}, {y0}) size {width}x{height} is not owned by a single amplifier")]
    RegionNotOwned {
        /// Leftmost column of the region.
        x0: usize,
        /// Topmost row of the region.
        y0: usize,
        /// Region width.
        width: usize,
        /// Region height.
        height: usize,
    },

    /// The declarative layout table is inconsistent.
    #[error("bad layout for detector {detector:?}: {reason}")]
    BadLayout {
        /// Detector name.
        detector: String,
        /// What is wrong with the layout.
        reason: String,
    },

    /// Lookup of an amplifier name that the detector does not have.
    #[error("unknown amplifier {name:?}")]
    UnknownAmplifier {
        /// The requested amplifier name.
        name: String,
    },

    /// Lookup of a filter name missing from the filter table.
    #[error("unknown filter {name:?}")]
    UnknownFilter {
        /// The requested filter name.
        name: String,
    },
}
