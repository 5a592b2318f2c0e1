//! Robust statistics over pixel samples.

/// Calculate the median of a slice of f64 values.
///
/// NaN values are filtered out before sorting; infinite values are kept.
/// For even-length data the two middle values are averaged.
pub fn median(values: &[f64]) -> Result<f64, String> {
    percentile(values, 50.0)
}

/// Calculate a percentile (0..=100) with linear interpolation between ranks.
///
/// NaN values are filtered out before sorting.
pub fn percentile(values: &[f64], pct: f64) -> Result<f64, String> {
    if !(0.0..=100.0).contains(&pct) {
        return Err(format!("percentile {pct} outside [0, 100]"));
    }

    let mut valid: Vec<f64> = values.iter().filter(|v| !v.is_nan()).copied().collect();
    if valid.is_empty() {
        return Err(format!(
            "insufficient data points: {} total values, 0 valid (all NaN)",
            values.len()
        ));
    }
    valid.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let rank = pct / 100.0 * (valid.len() - 1) as f64;
    let below = rank.floor() as usize;
    let above = rank.ceil() as usize;
    if below == above {
        return Ok(valid[below]);
    }
    let frac = rank - below as f64;
    Ok(valid[below] * (1.0 - frac) + valid[above] * frac)
}

/// Calculate the 25th and 75th percentiles in one pass over the data.
pub fn quartiles(values: &[f64]) -> Result<(f64, f64), String> {
    Ok((percentile(values, 25.0)?, percentile(values, 75.0)?))
}
