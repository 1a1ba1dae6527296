use mos_core::grid::logspace;
use mos_core::noise::{extract_noise_model, INITIAL_FLICKER_SLOPE};

const THERMAL: f64 = 1e-8;

fn spectrum(corner: f64, ripple: f64) -> (Vec<f64>, Vec<f64>) {
    let frequency = logspace(1.0, 1e9, 81);
    let noise = frequency
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let clean = THERMAL + THERMAL * (corner / f).powf(1.5).sqrt();
            clean * (1.0 + ripple * (1.7 * i as f64).sin())
        })
        .collect();
    (frequency, noise)
}

#[test]
fn recovers_synthetic_corner() {
    let (frequency, noise) = spectrum(1e4, 0.0);
    let model = extract_noise_model(&frequency, &noise);

    assert!((model.thermal - THERMAL).abs() / THERMAL < 0.01);
    let corner = model.corner_frequency.unwrap();
    assert!(corner > 0.5e4 && corner < 2e4, "corner {}", corner);
    let slope = model.flicker_slope.unwrap();
    assert!(slope < INITIAL_FLICKER_SLOPE && slope > 1.4, "slope {}", slope);
}

#[test]
fn recovers_corner_with_measurement_ripple() {
    for corner in [1e3, 1e4, 1e5] {
        let (frequency, noise) = spectrum(corner, 0.002);
        let model = extract_noise_model(&frequency, &noise);

        assert!((model.thermal - THERMAL).abs() / THERMAL < 0.15);
        let found = model.corner_frequency.unwrap();
        assert!(found > corner / 2.0 && found < corner * 2.0, "corner {} vs {}", found, corner);
        assert!(model.flicker_slope.unwrap() <= INITIAL_FLICKER_SLOPE);
    }
}

#[test]
fn flat_spectrum_below_one_hertz_has_no_corner() {
    let frequency = [0.1, 0.2, 0.5, 1.0];
    let noise = [3e-9; 4];
    let model = extract_noise_model(&frequency, &noise);

    assert_eq!(model.thermal, 3e-9);
    assert_eq!(model.corner_frequency, None);
    assert_eq!(model.flicker_slope, None);
    let (thermal, corner, slope) = model.table_values();
    assert_eq!(thermal, 3e-9);
    assert!(corner.is_nan());
    assert!(slope.is_nan());
}

#[test]
fn mismatched_lengths_use_common_prefix() {
    let (frequency, noise) = spectrum(1e4, 0.0);
    let full = extract_noise_model(&frequency, &noise);
    let mut longer = noise.clone();
    longer.extend([1.0, 2.0, 3.0]);
    assert_eq!(extract_noise_model(&frequency, &longer), full);
}
