//! Immutable filter band lookup table.
//!
//! Replaces process-wide filter registration with an explicit table built
//! once at startup and passed by reference to the calls that need it.

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// One photometric filter band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterBand {
    /// Canonical band name.
    pub name: String,
    /// Effective wavelength in nanometres.
    pub wavelength_nm: f64,
    /// Alternate names accepted on lookup (vendor header spellings).
    pub aliases: Vec<String>,
}

/// Lookup table of filter bands known to the instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterTable {
    bands: Vec<FilterBand>,
}

impl FilterTable {
    /// Build a table from a list of bands.
    pub fn new(bands: Vec<FilterBand>) -> Self {
        Self { bands }
    }

    /// Look up a band by canonical name or alias.
    pub fn get(&self, name: &str) -> Result<&FilterBand, GeometryError> {
        self.bands
            .iter()
            .find(|band| band.name == name || band.aliases.iter().any(|a| a == name))
            .ok_or_else(|| GeometryError::UnknownFilter {
                name: name.to_string(),
            })
    }

    /// All bands in table order.
    pub fn bands(&self) -> &[FilterBand] {
        &self.bands
    }
}

/// The ugrizy band set used with this instrument, plus an open position.
///
/// Effective wavelengths follow the survey reference filter curves.
pub fn ugrizy() -> FilterTable {
    let band = |name: &str, wavelength_nm: f64, aliases: &[&str]| FilterBand {
        name: name.to_string(),
        wavelength_nm,
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
    };
    FilterTable::new(vec![
        band("u", 364.59, &[]),
        band("g", 476.31, &["SDSSG"]),
        band("r", 619.42, &["SDSSR"]),
        band("i", 752.06, &["SDSSI"]),
        band("z", 866.85, &["SDSSZ"]),
        band("y", 971.68, &["y4"]),
        band("NONE", 0.0, &["no_filter", "OPEN"]),
    ])
}
