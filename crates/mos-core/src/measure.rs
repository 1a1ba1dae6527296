//! Figures of merit measured from simulated waveforms.
//!
//! Absent results (a curve that never crosses its threshold) are `None`,
//! never an error.

use std::f64::consts::PI;

use num_complex::Complex64;

/// Advisory limits for stability margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginLimits {
    /// Minimum phase margin [deg]
    pub phase: f64,
    /// Minimum gain margin [dB]
    pub gain: f64,
}

impl Default for MarginLimits {
    fn default() -> Self {
        Self {
            phase: 45.0,
            gain: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainBandwidth {
    pub dc_gain: f64,
    pub unity_bandwidth: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StabilityMargins {
    pub phase_margin: Option<f64>,
    pub gain_margin: Option<f64>,
    pub unity_bandwidth: Option<f64>,
    /// Frequency where the phase passes -180 degrees.
    pub inversion_frequency: Option<f64>,
}

/// Sweep value and magnitude of the first maximum of `signal`.
pub fn measure_max(sweep: &[f64], signal: &[f64]) -> Option<(f64, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in signal.iter().enumerate() {
        match best {
            Some((_, m)) if !(v > m) => {}
            _ if v.is_nan() => {}
            _ => best = Some((i, v)),
        }
    }
    let (index, max) = best?;
    Some((*sweep.get(index)?, max))
}

/// Magnitude in dB.
pub fn gain_db(response: &[Complex64]) -> Vec<f64> {
    response.iter().map(|z| 20.0 * z.norm().log10()).collect()
}

/// Unwrapped phase in degrees.
pub fn phase_degrees(response: &[Complex64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(response.len());
    let mut offset = 0.0;
    let mut previous: Option<f64> = None;
    for z in response {
        let raw = z.arg();
        if let Some(prev) = previous {
            let jump = raw + offset - prev;
            if jump > PI || jump < -PI {
                offset -= 2.0 * PI * (jump / (2.0 * PI)).round();
            }
        }
        let unwrapped = raw + offset;
        out.push(unwrapped);
        previous = Some(unwrapped);
    }
    out.into_iter().map(f64::to_degrees).collect()
}

/// Index of the first sample after a sign change of `values`.
fn first_sign_change(values: &[f64]) -> Option<usize> {
    values
        .windows(2)
        .position(|w| w[0].signum() != w[1].signum() && w[0] != 0.0 && w[1] != 0.0)
        .map(|i| i + 1)
}

/// DC gain in dB and the frequency where the gain first crosses 0 dB.
pub fn measure_gain_bandwidth(frequency: &[f64], response: &[Complex64]) -> Option<GainBandwidth> {
    let gain = gain_db(response);
    let dc_gain = *gain.first()?;
    let unity_bandwidth = first_sign_change(&gain).and_then(|i| frequency.get(i).copied());
    Some(GainBandwidth {
        dc_gain,
        unity_bandwidth,
    })
}

/// Phase margin at the 0 dB crossing and gain margin where the phase passes
/// -180 degrees. With `invert` the phase is shifted by 360 degrees first.
/// Missing or low margins are logged against `limits` when `alert` is set.
pub fn measure_phase_gain_margin(
    frequency: &[f64],
    response: &[Complex64],
    limits: &MarginLimits,
    invert: bool,
    alert: bool,
) -> StabilityMargins {
    let gain = gain_db(response);
    let mut phase = phase_degrees(response);
    if invert {
        phase.iter_mut().for_each(|p| *p += 360.0);
    }

    let mut margins = StabilityMargins::default();
    if let Some(i) = first_sign_change(&gain) {
        margins.phase_margin = phase.get(i).copied();
        margins.unity_bandwidth = frequency.get(i).copied();
    }
    let shifted: Vec<f64> = phase.iter().map(|p| p + 180.0).collect();
    if let Some(i) = first_sign_change(&shifted) {
        margins.gain_margin = gain.get(i).map(|g| -g);
        margins.inversion_frequency = frequency.get(i).copied();
    }

    if alert {
        match margins.phase_margin {
            Some(pm) if pm < limits.phase => {
                tracing::warn!(phase_margin = pm, limit = limits.phase, "phase margin below limit")
            }
            Some(_) => {}
            None => tracing::warn!("phase margin not found"),
        }
        match margins.gain_margin {
            Some(gm) if gm < limits.gain => {
                tracing::warn!(gain_margin = gm, limit = limits.gain, "gain margin below limit")
            }
            Some(_) => {}
            None => tracing::warn!("gain margin not found"),
        }
    }
    margins
}

/// Rising edge at `i`: two samples above `threshold` preceded by one below.
fn is_rising_edge(signal: &[f64], i: usize, threshold: f64) -> bool {
    signal[i] > threshold && signal[i - 1] > threshold && signal[i - 2] < threshold
}

fn next_rising_edge(signal: &[f64], from: usize, threshold: f64) -> Option<usize> {
    (from.max(2)..signal.len()).find(|&i| is_rising_edge(signal, i, threshold))
}

/// Oscillation frequency from the period between the second and third
/// rising edges; the first edge is skipped as start-up.
pub fn measure_frequency(time: &[f64], signal: &[f64], threshold: f64) -> Option<f64> {
    let first = next_rising_edge(signal, 2, threshold)?;
    let second = next_rising_edge(signal, first + 3, threshold)?;
    let third = next_rising_edge(signal, second + 3, threshold)?;
    let period = time.get(third)? - time.get(second)?;
    (period > 0.0).then(|| 1.0 / period)
}

/// `vds - vdsat` per sample; negative means out of saturation.
pub fn vdsat_margin(vds: &[f64], vdsat: &[f64]) -> Vec<f64> {
    vds.iter().zip(vdsat).map(|(d, s)| d.abs() - s.abs()).collect()
}

/// Drain-source and saturation voltages of one device across a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceBias {
    pub name: String,
    pub vds: Vec<f64>,
    pub vdsat: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaturationViolation {
    pub device: String,
    pub index: usize,
    pub margin: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SaturationReport {
    pub checked: Vec<String>,
    pub skipped: Vec<String>,
    pub violations: Vec<SaturationViolation>,
}

impl SaturationReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Device names containing one of these are switches, triode loads,
/// decoupling or dummies and are not expected to saturate.
pub const DEFAULT_EXEMPT: [&str; 4] = ["sw", "triode", "decap", "dum"];

/// Check every device not matching `exempt` for a negative saturation
/// margin.
pub fn check_saturation(devices: &[DeviceBias], exempt: &[&str]) -> SaturationReport {
    let mut report = SaturationReport::default();
    for device in devices {
        let lower = device.name.to_ascii_lowercase();
        if exempt.iter().any(|e| lower.contains(e)) {
            report.skipped.push(device.name.clone());
            continue;
        }
        report.checked.push(device.name.clone());
        for (index, margin) in vdsat_margin(&device.vds, &device.vdsat).into_iter().enumerate() {
            if margin < 0.0 {
                report.violations.push(SaturationViolation {
                    device: device.name.clone(),
                    index,
                    margin,
                });
            }
        }
    }
    if report.passed() {
        tracing::info!(devices = report.checked.len(), "all checked devices in saturation");
    } else {
        for v in &report.violations {
            tracing::warn!(device = %v.device, index = v.index, margin = v.margin, "device out of saturation");
        }
    }
    report
}
