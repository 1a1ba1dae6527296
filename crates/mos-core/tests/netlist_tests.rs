use mos_core::config::SimulatorKind;
use mos_core::grid::{current_axis, RangeSpec};
use mos_core::netlist::{format_param_value, ParamSet, RunSettings, Testbench};

const BENCH: &str = "* pmos characterisation
XM d g vdd vdd {device} w=1u
+ l='l'
.save {save}
.end";

fn params() -> ParamSet {
    let mut params = ParamSet::new();
    params.set("vds", -0.9).set("l", 0.5).set("ids", 1e-7);
    params
}

#[test]
fn param_values_use_shortest_scientific_notation() {
    assert_eq!(format_param_value(1e-7), "1e-7");
    assert_eq!(format_param_value(0.9), "9e-1");
    assert_eq!(format_param_value(1.8), "1.8e0");
    assert_eq!(format_param_value(0.0), "0e0");
    assert_eq!(format_param_value(1.1242100350620886e-6), "1.1242100350620886e-6");
}

#[test]
fn every_target_current_survives_rendering() {
    let bench = Testbench::new(BENCH).for_device("pfet", "");
    let settings = RunSettings::default();
    let currents = current_axis(&RangeSpec::new(1e-9, 1e-3, 10.0)).unwrap();
    assert_eq!(currents.len(), 60);

    let mut rendered = Vec::new();
    for ids in &currents {
        let mut params = ParamSet::new();
        params.set("ids", *ids);
        let text = bench.render(SimulatorKind::Ngspice, &params, &settings);
        let value = text
            .lines()
            .find_map(|line| line.strip_prefix(".param ids="))
            .unwrap();
        let parsed: f64 = value.parse().unwrap();
        assert_eq!(parsed.to_bits(), ids.to_bits(), "{} rendered as {}", ids, value);
        rendered.push(value.to_string());
    }
    rendered.sort();
    rendered.dedup();
    assert_eq!(rendered.len(), currents.len());
}

#[test]
fn continuation_lines_are_folded() {
    let bench = Testbench::new(BENCH);
    assert!(bench.template().contains("w=1u  l='l'"));
}

#[test]
fn device_and_save_placeholders_are_replaced() {
    let bench = Testbench::new(BENCH).for_device("pfet", "@M.XM.mpfet[id] @M.XM.mpfet[gm] ");
    assert!(bench.template().contains("XM d g vdd vdd pfet w=1u"));
    assert!(bench.template().contains(".save @M.XM.mpfet[id] @M.XM.mpfet[gm]\n"));
    assert!(!bench.template().contains("{device}"));
}

#[test]
fn ngspice_render_puts_params_after_title() {
    let bench = Testbench::new(BENCH).for_device("pfet", "");
    let settings = RunSettings {
        temperature: 85.0,
        corner: "ss".to_string(),
        library: Some("sky130.lib.spice".to_string()),
    };
    let text = bench.render(SimulatorKind::Ngspice, &params(), &settings);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "* pmos characterisation");
    assert_eq!(lines[1], ".param vds=-9e-1");
    assert_eq!(lines[2], ".param l=5e-1");
    assert_eq!(lines[3], ".param ids=1e-7");
    assert_eq!(lines[4], ".temp 85");
    assert_eq!(lines[5], ".lib sky130.lib.spice ss");
    assert!(text.ends_with(".end\n"));
}

#[test]
fn dialects_differ_in_header() {
    let bench = Testbench::new(BENCH);
    let settings = RunSettings::default();

    let xyce = bench.render(SimulatorKind::Xyce, &params(), &settings);
    assert!(xyce.contains(".options device temp=27\n"));
    assert!(!xyce.contains(".temp"));
    assert!(!xyce.contains(".lib"));

    let spectre = bench.render(SimulatorKind::Spectre, &params(), &settings);
    assert_eq!(spectre.lines().nth(1), Some("simulator lang=spice"));
}
