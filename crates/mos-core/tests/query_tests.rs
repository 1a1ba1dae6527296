use std::collections::BTreeMap;
use std::f64::consts::PI;

use mos_core::query::{integrate_noise, Conditions, QueryEngine, QueryValue};
use mos_core::store::{AxisValues, CharacterisationRecord, Indexing};
use mos_core::table::Table;
use mos_core::CharError;
use mos_devices::mos::{MosRegion, MosType};

const L: [f64; 3] = [0.15e-6, 0.5e-6, 1.0e-6];
const VDS: [f64; 3] = [0.0, 1.0, 2.0];
const CURRENTS: usize = 4;

/// `id` grows a decade per current index and scales with the l/vds indices
/// so every lane is distinct.
fn id_at(li: usize, di: usize, ci: usize) -> f64 {
    1e-6 * 10f64.powi(ci as i32) * (1.0 + li as f64) * (1.0 + 0.1 * di as f64)
}

fn build_table(f: impl Fn(usize, usize, usize) -> f64) -> Table {
    let shape = [L.len(), VDS.len(), 1, CURRENTS];
    let mut table = Table::zeros(&shape);
    for li in 0..L.len() {
        for di in 0..VDS.len() {
            for ci in 0..CURRENTS {
                table.set(&[li, di, 0, ci], f(li, di, ci));
            }
        }
    }
    table
}

fn record(thermal: f64, corner: f64, slope: f64) -> CharacterisationRecord {
    let indexing = Indexing::new(vec![
        ("vbs", AxisValues::numeric(vec![0.0])),
        ("vds", AxisValues::numeric(VDS.to_vec())),
        ("l", AxisValues::numeric(L.to_vec())),
    ]);
    let mut tables = BTreeMap::new();
    tables.insert("id".to_string(), build_table(id_at));
    tables.insert("gm".to_string(), build_table(|l, d, c| 10.0 * id_at(l, d, c)));
    tables.insert("gds".to_string(), build_table(|l, d, c| 0.1 * id_at(l, d, c)));
    tables.insert("cgg".to_string(), build_table(|_, _, c| 1e-15 * (c + 1) as f64));
    tables.insert("vgs".to_string(), build_table(|_, _, c| 0.3 + 0.2 * c as f64));
    tables.insert("vth".to_string(), build_table(|_, _, _| 0.45));
    tables.insert("vds".to_string(), build_table(|_, d, _| VDS[d]));
    tables.insert("vdsat".to_string(), build_table(|_, _, _| 0.1));
    tables.insert("noise_thermal".to_string(), build_table(|_, _, _| thermal));
    tables.insert("noise_corner".to_string(), build_table(|_, _, _| corner));
    tables.insert("noise_slope".to_string(), build_table(|_, _, _| slope));
    CharacterisationRecord::new(tables, 1e-6, indexing).unwrap()
}

fn engine() -> QueryEngine {
    QueryEngine::new(record(1e-18, 1e5, 1.2))
}

fn lane(value: QueryValue) -> Vec<f64> {
    match value {
        QueryValue::Lane(v) => v,
        QueryValue::Scalar(v) => panic!("expected a lane, got scalar {}", v),
    }
}

fn assert_close(a: f64, b: f64) {
    let tol = 1e-12 * a.abs().max(b.abs()).max(f64::MIN_POSITIVE);
    assert!((a - b).abs() <= tol, "{} != {}", a, b);
}

#[test]
fn exact_axis_value_selects_its_index() {
    let engine = engine();
    let conditions = Conditions::new()
        .with("l", 0.5e-6)
        .with("vds", 1.0)
        .with("vbs", 0.0);
    let ids = lane(engine.query("id", &conditions).unwrap());
    let expected: Vec<f64> = (0..CURRENTS).map(|c| id_at(1, 1, c)).collect();
    assert_eq!(ids, expected);
}

#[test]
fn equidistant_condition_takes_lower_index() {
    let engine = engine();
    let conditions = Conditions::new().with("l", 0.15e-6).with("vds", 0.5);
    let ids = lane(engine.query("id", &conditions).unwrap());
    assert_eq!(ids[0], id_at(0, 0, 0));
}

#[test]
fn missing_axes_default_to_first_value_and_unknown_keys_are_ignored() {
    let engine = engine();
    let plain = engine.query("gm", &Conditions::new()).unwrap();
    let noisy = engine
        .query("gm", &Conditions::new().with("temperature", 85.0))
        .unwrap();
    assert_eq!(plain, noisy);
    assert_eq!(lane(plain)[2], 10.0 * id_at(0, 0, 2));
}

#[test]
fn ratio_is_elementwise_quotient() {
    let engine = engine();
    let conditions = Conditions::new().with("l", 1.0e-6).with("vds", 2.0);
    let gm = lane(engine.query("gm", &conditions).unwrap());
    let id = lane(engine.query("id", &conditions).unwrap());
    let ratio = lane(engine.query("gm/id", &conditions).unwrap());
    for i in 0..CURRENTS {
        assert_eq!(ratio[i], gm[i] / id[i]);
        assert_close(ratio[i], 10.0);
    }

    let gds = lane(engine.query("gds", &conditions).unwrap());
    let inverse = lane(engine.query("1/gds", &conditions).unwrap());
    for i in 0..CURRENTS {
        assert_eq!(inverse[i], 1.0 / gds[i]);
    }
}

#[test]
fn angular_operand_scales_by_two_pi() {
    let engine = engine();
    let conditions = Conditions::new().with("l", 0.5e-6);
    let ft = lane(engine.query("gm/2*pi*cgg", &conditions).unwrap());
    let gm = lane(engine.query("gm", &conditions).unwrap());
    let cgg = lane(engine.query("cgg", &conditions).unwrap());
    for i in 0..CURRENTS {
        assert_close(ft[i], gm[i] / (2.0 * PI * cgg[i]));
    }
}

#[test]
fn id_condition_returns_nearest_current_sample() {
    let engine = engine();
    let conditions = Conditions::new()
        .with("l", 0.5e-6)
        .with("vds", 1.0)
        .with("id", 2.0e-5);
    // id lane at (l=1, vds=1) is 2.2e-6, 2.2e-5, 2.2e-4, 2.2e-3
    let gm = engine.query("gm", &conditions).unwrap();
    assert_eq!(gm, QueryValue::Scalar(10.0 * id_at(1, 1, 1)));
    let ratio = engine.query("gm/id", &conditions).unwrap();
    assert_close(ratio.as_scalar().unwrap(), 10.0);
}

#[test]
fn matching_value_cross_references_lanes() {
    let engine = engine();
    let conditions = Conditions::new().with("l", 0.15e-6).with("vds", 0.0);
    let gm = engine
        .get_matching_value("id", "gm", 1.1e-4, &conditions)
        .unwrap();
    assert_eq!(gm, 10.0 * id_at(0, 0, 2));
    let gm_id = engine
        .get_matching_value("id", "gm/id", 1e-9, &conditions)
        .unwrap();
    assert_close(gm_id, 10.0);
}

#[test]
fn integrated_noise_matches_closed_form() {
    let engine = engine();
    let conditions = Conditions::new().with("f_hi", 1e6);
    let noise = lane(engine.query("integrated_noise", &conditions).unwrap());

    let (thermal, corner, slope, f_lo, f_hi) = (1e-18, 1e5, 1.2, 0.01, 1e6);
    let m = thermal * f64::powf(corner, slope);
    let expected = (f_hi - f_lo) * thermal
        + m / (1.0 - slope) * f64::powf(f_hi, 1.0 - slope)
        + m / (slope - 1.0) * f64::powf(f_lo, 1.0 - slope);
    assert_eq!(noise.len(), CURRENTS);
    for value in noise {
        assert_close(value, expected);
    }
}

#[test]
fn integrated_noise_honours_f_lo_and_id() {
    let engine = engine();
    let conditions = Conditions::new()
        .with("f_hi", 1e6)
        .with("f_lo", 10.0)
        .with("id", 1e-6);
    let value = engine
        .query("integrated_noise", &conditions)
        .unwrap()
        .as_scalar()
        .unwrap();
    assert_close(value, integrate_noise(1e-18, 1e5, 1.2, 10.0, 1e6));
}

#[test]
fn integrated_noise_unit_slope_uses_log_limit() {
    let engine = QueryEngine::new(record(1e-18, 1e5, 1.0));
    let noise = lane(
        engine
            .query("integrated_noise", &Conditions::new().with("f_hi", 1e6))
            .unwrap(),
    );
    let expected = (1e6 - 0.01) * 1e-18 + 1e-18 * 1e5 * (1e6f64 / 0.01).ln();
    for value in noise {
        assert!(value.is_finite());
        assert_close(value, expected);
    }
}

#[test]
fn integrated_noise_without_corner_is_thermal_only() {
    let engine = QueryEngine::new(record(2e-18, f64::NAN, f64::NAN));
    let noise = lane(
        engine
            .query("integrated_noise", &Conditions::new().with("f_hi", 1e3))
            .unwrap(),
    );
    assert_close(noise[0], (1e3 - 0.01) * 2e-18);
}

#[test]
fn integrated_noise_requires_f_hi() {
    let engine = engine();
    let err = engine
        .query("integrated_noise", &Conditions::new().with("f_lo", 1.0))
        .unwrap_err();
    assert!(matches!(err, CharError::MissingCondition(_)));
}

#[test]
fn unknown_axis_lists_valid_names() {
    let engine = engine();
    match engine.get_parameter_values("temp") {
        Err(CharError::UnknownAxis { axis, valid }) => {
            assert_eq!(axis, "temp");
            assert_eq!(valid, vec!["vbs", "vds", "l"]);
        }
        other => panic!("unexpected {:?}", other),
    }
    let vds = engine.get_parameter_values("vds").unwrap();
    assert_eq!(vds.as_numeric().unwrap(), &VDS);
}

#[test]
fn field_names_include_width_and_index() {
    let engine = engine();
    let names = engine.get_field_names();
    assert!(names.contains(&"w".to_string()));
    assert!(names.contains(&"indexing".to_string()));
    assert!(names.contains(&"noise_slope".to_string()));
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    assert_eq!(engine.get_parameter_names(), vec!["vbs", "vds", "l"]);
}

#[test]
fn bad_expressions_and_fields_are_errors() {
    let engine = engine();
    let conditions = Conditions::new();
    assert!(matches!(
        engine.query("gm/id/gds", &conditions),
        Err(CharError::Expression(_))
    ));
    assert!(matches!(
        engine.query("beta", &conditions),
        Err(CharError::FieldNotFound(_))
    ));
    assert!(matches!(
        engine.query("gm", &Conditions::new().with("vds", vec![0.0, 1.0])),
        Err(CharError::Condition(_))
    ));
}

#[test]
fn overlay_expands_list_conditions_in_order() {
    let engine = engine();
    let conditions = Conditions::new()
        .with("l", vec![0.15e-6, 1.0e-6])
        .with("vds", vec![0.0, 1.0, 2.0])
        .with("id", 1e-5);
    let points = engine.overlay("gm/id", &conditions).unwrap();
    assert_eq!(points.len(), 6);

    assert_eq!(points[0].conditions.value("l"), Some(0.15e-6));
    assert_eq!(points[0].conditions.value("vds"), Some(0.0));
    assert_eq!(points[1].conditions.value("vds"), Some(1.0));
    assert_eq!(points[3].conditions.value("l"), Some(1.0e-6));
    assert_eq!(points[5].conditions.value("id"), Some(1e-5));

    for point in &points {
        let direct = engine.query("gm/id", &point.conditions).unwrap();
        assert_eq!(point.value, direct);
    }
}

#[test]
fn overlay_without_lists_is_a_single_query() {
    let engine = engine();
    let conditions = Conditions::new().with("l", 0.5e-6);
    let points = engine.overlay("id", &conditions).unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].value, engine.query("id", &conditions).unwrap());
}

#[test]
fn operating_region_follows_bias() {
    let engine = engine();
    let regions = engine
        .operating_region(&Conditions::new().with("vds", 1.0), MosType::Nmos)
        .unwrap();
    // vgs = 0.3, 0.5, 0.7, 0.9 against vth = 0.45
    assert_eq!(
        regions,
        vec![
            MosRegion::Cutoff,
            MosRegion::Saturation,
            MosRegion::Saturation,
            MosRegion::Saturation
        ]
    );
    let linear = engine
        .operating_region(&Conditions::new().with("vds", 0.0), MosType::Nmos)
        .unwrap();
    assert_eq!(linear[3], MosRegion::Linear);
}

#[test]
fn conditions_deserialize_from_json() {
    let conditions: Conditions =
        serde_json::from_str(r#"{"l": 0.5e-6, "vds": [0.0, 1.0], "corner": "tt"}"#).unwrap();
    assert_eq!(conditions.value("l"), Some(0.5e-6));
    assert!(conditions.value("vds").is_none());
    assert_eq!(conditions.len(), 3);
}
