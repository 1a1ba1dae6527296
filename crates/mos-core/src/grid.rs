//! Sweep axis generation.

use serde::{Deserialize, Serialize};

use crate::error::{CharError, Result};

/// `[min, max, n]` range as written in the device list.
///
/// For linear axes `n` is the point count; for the drain-current axis it is
/// the number of points per decade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct RangeSpec {
    pub min: f64,
    pub max: f64,
    pub n: f64,
}

impl RangeSpec {
    pub fn new(min: f64, max: f64, n: f64) -> Self {
        Self { min, max, n }
    }
}

impl From<[f64; 3]> for RangeSpec {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<RangeSpec> for [f64; 3] {
    fn from(r: RangeSpec) -> Self {
        [r.min, r.max, r.n]
    }
}

/// Evenly spaced values, endpoints inclusive.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count)
                .map(|i| if i == count - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Values spaced evenly in log10 between `start` and `stop`, endpoints
/// inclusive. Both must be positive.
pub fn logspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    linspace(start.log10(), stop.log10(), count)
        .into_iter()
        .map(|e| 10f64.powf(e))
        .collect()
}

/// Linear axis for a Vds / Vbs range.
pub fn linear_axis(name: &str, range: &RangeSpec) -> Result<Vec<f64>> {
    if !(range.n >= 1.0) || range.n.fract() != 0.0 {
        return Err(CharError::InvalidRange {
            name: name.to_string(),
            message: format!("point count must be a positive integer, got {}", range.n),
        });
    }
    Ok(linspace(range.min, range.max, range.n as usize))
}

/// Target drain-current list: log spaced between the magnitudes of the
/// endpoints with `floor(decades * points_per_decade)` points.
pub fn current_axis(range: &RangeSpec) -> Result<Vec<f64>> {
    let lo = range.min.abs();
    let hi = range.max.abs();
    if lo == 0.0 || hi == 0.0 {
        return Err(CharError::InvalidRange {
            name: "ids".to_string(),
            message: "current endpoints must be non-zero".to_string(),
        });
    }
    let count = ((hi / lo).log10() * range.n).trunc();
    if !(count >= 1.0) {
        return Err(CharError::InvalidRange {
            name: "ids".to_string(),
            message: format!(
                "{} decades at {} points per decade gives no points",
                (hi / lo).log10(),
                range.n
            ),
        });
    }
    Ok(logspace(lo, hi, count as usize))
}
