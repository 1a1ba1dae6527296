//! Flicker + thermal noise model extraction.
//!
//! The flicker curve is anchored at the first spectrum sample and rolls off
//! as `noise[0] / sqrt(f^slope)`. The slope starts at 1.5 and is walked down
//! in steps of 0.001 until the curve no longer undercuts the measured
//! spectrum at half the corner index. Stored corner/slope pairs come from
//! exactly this walk, so integrated-noise lookups depend on it.

use serde::{Deserialize, Serialize};

pub const INITIAL_FLICKER_SLOPE: f64 = 1.5;
pub const FLICKER_SLOPE_STEP: f64 = 0.001;
/// Drop the first step of a spectrum is measured against.
pub const FIRST_DROP_BOUND: f64 = 1.0;

/// Result of fitting one output-noise spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseModel {
    pub thermal: f64,
    pub corner_frequency: Option<f64>,
    pub flicker_slope: Option<f64>,
}

impl NoiseModel {
    /// Values as written into the noise tables; absent values become NaN.
    pub fn table_values(&self) -> (f64, f64, f64) {
        (
            self.thermal,
            self.corner_frequency.unwrap_or(f64::NAN),
            self.flicker_slope.unwrap_or(f64::NAN),
        )
    }
}

/// Fit thermal floor, corner frequency and flicker slope to a spectrum
/// sampled at ascending `frequency`.
///
/// A spectrum whose flicker curve never drops under the floor in-band has
/// no corner; corner and slope are then `None`.
pub fn extract_noise_model(frequency: &[f64], noise: &[f64]) -> NoiseModel {
    let length = frequency.len().min(noise.len());
    if length == 0 {
        return NoiseModel {
            thermal: f64::NAN,
            corner_frequency: None,
            flicker_slope: None,
        };
    }
    let frequency = &frequency[..length];
    let noise = &noise[..length];

    let mut slope = INITIAL_FLICKER_SLOPE;
    let mut flicker = flicker_curve(frequency, noise[0], slope);
    let thermal = thermal_floor(noise);

    // index 0 never counts as a corner: the curves meet there by construction
    let corner_index = match first_below(&flicker, thermal) {
        Some(index) if index > 0 => index,
        _ => {
            return NoiseModel {
                thermal,
                corner_frequency: None,
                flicker_slope: None,
            }
        }
    };

    let half = corner_index / 2;
    let mut steps = 0usize;
    while flicker[half] - noise[half] < 0.0 && slope > 0.0 {
        slope -= FLICKER_SLOPE_STEP;
        flicker = flicker_curve(frequency, noise[0], slope);
        steps += 1;
    }
    tracing::trace!(steps, slope, "flicker slope refined");

    match first_below(&flicker, thermal) {
        Some(index) => NoiseModel {
            thermal,
            corner_frequency: Some(frequency[index]),
            flicker_slope: Some(slope),
        },
        None => NoiseModel {
            thermal,
            corner_frequency: None,
            flicker_slope: None,
        },
    }
}

fn flicker_curve(frequency: &[f64], anchor: f64, slope: f64) -> Vec<f64> {
    let mut curve = Vec::with_capacity(frequency.len());
    curve.push(anchor);
    for f in &frequency[1..] {
        curve.push(anchor / f.powf(slope).sqrt());
    }
    curve
}

/// Floor is the first sample where the drop between neighbours grows
/// again, or the last sample when the spectrum keeps flattening.
///
/// The first drop is compared against [`FIRST_DROP_BOUND`], so a spectrum
/// whose first step exceeds it takes its second sample as the floor. Output
/// noise densities in V²/Hz never come close.
fn thermal_floor(noise: &[f64]) -> f64 {
    let mut previous = FIRST_DROP_BOUND;
    for n in 1..noise.len() {
        let drop = noise[n - 1] - noise[n];
        if drop > previous {
            return noise[n];
        }
        previous = drop;
    }
    noise[noise.len() - 1]
}

fn first_below(flicker: &[f64], thermal: f64) -> Option<usize> {
    flicker.iter().position(|f| f - thermal < 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thermal_floor_stops_where_drop_grows() {
        assert_eq!(thermal_floor(&[0.8, 0.4, 0.2, 0.1, 0.15, 0.1, 0.075]), 0.1);
        assert_eq!(thermal_floor(&[1.0, 0.6, 0.4, 0.3, 0.25]), 0.25);
        assert_eq!(thermal_floor(&[5.0]), 5.0);
    }

    #[test]
    fn first_drop_is_bounded() {
        // a first step above the bound ends the scan at once
        assert_eq!(thermal_floor(&[8.0, 4.0, 2.0, 1.0]), 4.0);
        assert_eq!(thermal_floor(&[8.0, 7.5, 7.25]), 7.25);
    }

    #[test]
    fn empty_spectrum_has_no_model() {
        let model = extract_noise_model(&[], &[]);
        assert!(model.thermal.is_nan());
        assert_eq!(model.corner_frequency, None);
    }
}
