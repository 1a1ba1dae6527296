//! MOSFET characterisation sweep.
//!
//! The engine walks the grid `l -> vbs -> vds -> ids`, runs one operating
//! point + noise simulation per grid point and accumulates the results into
//! dense `[l][vds][vbs][current]` tables. The finished tables are persisted
//! with declared axis order `[vbs, vds, l]`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mos_devices::mos::{bracketed_param, save_list, MosType, NOISE_FIELDS, OP_PARAMS};

use crate::config::{CharConfig, DeviceSpec, FailurePolicy, PvtConfig, TestbenchConfig};
use crate::error::{CharError, Result};
use crate::grid::{current_axis, linear_axis, RangeSpec};
use crate::netlist::{ParamSet, RunSettings, Testbench};
use crate::noise::{extract_noise_model, NoiseModel};
use crate::simulator::{SimRequest, SimResult, Simulator};
use crate::store::{write_record, AxisValues, CharacterisationRecord, Indexing};
use crate::table::Table;

pub const OP_DATASET: &str = "op1";
pub const NOISE_DATASET: &str = "noise1";
pub const OUTPUTS: [&str; 2] = [OP_DATASET, NOISE_DATASET];

pub const FREQUENCY_SIGNAL: &str = "frequency";
pub const NOISE_SIGNAL: &str = "onoise_spectrum";

/// Declared axis order written to the store index.
pub const AXIS_ORDER: [&str; 3] = ["vbs", "vds", "l"];

/// Supply domain used for the default `vdd` override.
pub const SUPPLY_DOMAIN: &str = "vdd";

/// Everything needed to characterise one device.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRequest {
    pub device: String,
    pub w: f64,
    pub l: Vec<f64>,
    pub ids: RangeSpec,
    pub vds: RangeSpec,
    pub vbs: RangeSpec,
    pub mos_type: MosType,
    pub vdd: Option<f64>,
    pub temperature: f64,
    pub corner: String,
}

impl SweepRequest {
    /// Request for one device-list entry. Temperature and corner fall back
    /// to the PVT section; `vdd` falls back to the `vdd` supply domain when
    /// one is configured.
    pub fn from_device(name: &str, spec: &DeviceSpec, pvt: &PvtConfig) -> Result<Self> {
        let vdd = match spec.vdd {
            Some(vdd) => Some(vdd),
            None if pvt.supplies.contains_key(SUPPLY_DOMAIN) => Some(pvt.nominal(SUPPLY_DOMAIN)?),
            None => None,
        };
        Ok(Self {
            device: name.to_string(),
            w: spec.w,
            l: spec.l.clone(),
            ids: spec.ids,
            vds: spec.vds,
            vbs: spec.vbs,
            mos_type: spec.mos_type,
            vdd,
            temperature: spec.temperature.unwrap_or(pvt.temperature),
            corner: spec.corner.clone().unwrap_or_else(|| pvt.corner.clone()),
        })
    }

    pub fn grid(&self) -> Result<SweepGrid> {
        if self.l.is_empty() {
            return Err(CharError::InvalidRange {
                name: "l".to_string(),
                message: "length list is empty".to_string(),
            });
        }
        Ok(SweepGrid {
            l: self.l.clone(),
            vds: linear_axis("vds", &self.vds)?,
            vbs: linear_axis("vbs", &self.vbs)?,
            ids: current_axis(&self.ids)?,
        })
    }

    pub fn settings(&self, library: Option<&str>) -> RunSettings {
        RunSettings {
            temperature: self.temperature,
            corner: self.corner.clone(),
            library: library.map(str::to_string),
        }
    }
}

/// Axis values of one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepGrid {
    pub l: Vec<f64>,
    pub vds: Vec<f64>,
    pub vbs: Vec<f64>,
    pub ids: Vec<f64>,
}

impl SweepGrid {
    /// `[l, vds, vbs, current]`
    pub fn shape(&self) -> [usize; 4] {
        [self.l.len(), self.vds.len(), self.vbs.len(), self.ids.len()]
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid points in sweep order: length outermost, then Vbs, then Vds,
    /// then target current.
    pub fn points(&self) -> impl Iterator<Item = GridPoint> + '_ {
        self.l.iter().enumerate().flat_map(move |(li, &l)| {
            self.vbs.iter().enumerate().flat_map(move |(bi, &vbs)| {
                self.vds.iter().enumerate().flat_map(move |(di, &vds)| {
                    self.ids.iter().enumerate().map(move |(ci, &ids)| GridPoint {
                        index: [li, di, bi, ci],
                        l,
                        vds,
                        vbs,
                        ids,
                    })
                })
            })
        })
    }

    pub fn indexing(&self) -> Indexing {
        Indexing::new(vec![
            (AXIS_ORDER[0], AxisValues::numeric(self.vbs.clone())),
            (AXIS_ORDER[1], AxisValues::numeric(self.vds.clone())),
            (AXIS_ORDER[2], AxisValues::numeric(self.l.clone())),
        ])
    }
}

/// One combination of (l, vds, vbs, target current).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    /// Table index `[l, vds, vbs, current]`.
    pub index: [usize; 4],
    pub l: f64,
    pub vds: f64,
    pub vbs: f64,
    pub ids: f64,
}

impl GridPoint {
    /// Netlist parameters of this point layered over `base`.
    pub fn params(&self, base: &ParamSet) -> ParamSet {
        let mut params = base.clone();
        params
            .set("vbs", self.vbs)
            .set("vds", self.vds)
            .set("l", self.l)
            .set("ids", self.ids);
        params
    }
}

/// Scalar results of one grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPointData {
    /// Operating-point values keyed by parameter name.
    pub op: Vec<(String, f64)>,
    pub noise: NoiseModel,
}

impl GridPointData {
    /// Read the operating point and fit the noise model from one run.
    pub fn from_result(result: &SimResult) -> Result<Self> {
        let dataset = result.dataset(OP_DATASET)?;
        let mut op = Vec::new();
        for (column, variable) in dataset.variables.iter().enumerate() {
            let Some(param) = bracketed_param(&variable.name) else {
                continue;
            };
            let Some(sample) = dataset.rows.first().and_then(|row| row.get(column)) else {
                continue;
            };
            op.push((param.to_ascii_lowercase(), sample.re));
        }

        let frequency = result.get_signal(FREQUENCY_SIGNAL, NOISE_DATASET)?;
        let spectrum = result.get_signal(NOISE_SIGNAL, NOISE_DATASET)?;
        Ok(Self {
            op,
            noise: extract_noise_model(&frequency, &spectrum),
        })
    }
}

/// Engine-level settings taken from the configuration file.
#[derive(Debug, Clone, Default)]
pub struct SweepOptions {
    pub testbench: TestbenchConfig,
    pub on_failure: FailurePolicy,
    pub results_dir: PathBuf,
}

impl SweepOptions {
    pub fn from_config(config: &CharConfig) -> Self {
        Self {
            testbench: config.testbench.clone(),
            on_failure: config.sweep.on_failure,
            results_dir: config.sweep.results_dir.clone(),
        }
    }
}

/// Tables being filled during a sweep.
#[derive(Debug, Clone)]
struct Accumulator {
    tables: BTreeMap<String, Table>,
}

impl Accumulator {
    fn new(shape: &[usize]) -> Self {
        let tables = OP_PARAMS
            .iter()
            .chain(NOISE_FIELDS.iter())
            .map(|name| (name.to_string(), Table::zeros(shape)))
            .collect();
        Self { tables }
    }

    fn record(&mut self, index: &[usize], data: &GridPointData) {
        for (param, value) in &data.op {
            match self.tables.get_mut(param) {
                Some(table) => {
                    table.set(index, *value);
                }
                None => tracing::trace!(param = %param, "ignoring unsaved parameter"),
            }
        }
        let (thermal, corner, slope) = data.noise.table_values();
        for (name, value) in NOISE_FIELDS.iter().zip([corner, slope, thermal]) {
            if let Some(table) = self.tables.get_mut(*name) {
                table.set(index, value);
            }
        }
    }

    fn fill_nan(&mut self, index: &[usize]) {
        for table in self.tables.values_mut() {
            table.set(index, f64::NAN);
        }
    }
}

pub struct SweepEngine<S: Simulator> {
    simulator: S,
    options: SweepOptions,
}

impl<S: Simulator> SweepEngine<S> {
    pub fn new(simulator: S, options: SweepOptions) -> Self {
        Self { simulator, options }
    }

    pub fn simulator(&self) -> &S {
        &self.simulator
    }

    pub fn simulator_mut(&mut self) -> &mut S {
        &mut self.simulator
    }

    pub fn options(&self) -> &SweepOptions {
        &self.options
    }

    /// Output file of a device: `<results_dir>/<device>.json`.
    pub fn output_path(&self, device: &str) -> PathBuf {
        record_path(&self.options.results_dir, device)
    }

    /// Load the polarity's test bench and characterise the device.
    pub fn characterise(&mut self, request: &SweepRequest) -> Result<CharacterisationRecord> {
        let path = self.options.testbench.template_for(request.mos_type);
        let bench = Testbench::from_path(path).map_err(|err| {
            CharError::Config(format!(
                "cannot read {} test bench {}: {}",
                request.mos_type,
                path.display(),
                err
            ))
        })?;
        self.characterise_with(&bench, request)
    }

    /// Characterise the device and write its record to the results
    /// directory, returning the written path.
    pub fn run_device(&mut self, request: &SweepRequest) -> Result<PathBuf> {
        let record = self.characterise(request)?;
        let path = self.output_path(&request.device);
        write_record(&path, &record)?;
        tracing::info!(device = %request.device, path = %path.display(), "characterisation written");
        Ok(path)
    }

    /// Run the full sweep against an already loaded test-bench template.
    pub fn characterise_with(
        &mut self,
        template: &Testbench,
        request: &SweepRequest,
    ) -> Result<CharacterisationRecord> {
        let grid = request.grid()?;
        let bench = template.for_device(&request.device, &save_list(&request.device, &OP_PARAMS));
        let settings = request.settings(self.options.testbench.library.as_deref());
        let mut base = ParamSet::new();
        if let Some(vdd) = request.vdd {
            base.set(SUPPLY_DOMAIN, vdd);
        }

        self.explore(&bench, &base, &settings)?;

        let shape = grid.shape();
        tracing::info!(
            device = %request.device,
            l = shape[0],
            vds = shape[1],
            vbs = shape[2],
            ids = shape[3],
            "starting sweep"
        );
        let mut tables = Accumulator::new(&shape);
        let mut failed = 0usize;

        for point in grid.points() {
            let params = point.params(&base);
            tracing::debug!(params = %params.describe(), "beginning new OP setting");
            match self.simulate_point(&bench, &params, &settings) {
                Ok(data) => tables.record(&point.index, &data),
                Err(err) => match self.options.on_failure {
                    FailurePolicy::Abort => return Err(err),
                    FailurePolicy::FillNan => {
                        tracing::warn!(
                            params = %params.describe(),
                            error = %err,
                            "grid point failed, filling with NaN"
                        );
                        tables.fill_nan(&point.index);
                        failed += 1;
                    }
                },
            }
        }

        if failed > 0 {
            tracing::warn!(device = %request.device, failed, total = grid.len(), "sweep finished with failed points");
        }
        CharacterisationRecord::new(tables.tables, request.w, grid.indexing())
    }

    /// One run with the bench defaults to check that both datasets come
    /// back before the grid is walked.
    fn explore(&mut self, bench: &Testbench, base: &ParamSet, settings: &RunSettings) -> Result<()> {
        let result = self.simulator.run(&SimRequest {
            testbench: bench,
            params: base,
            settings,
            outputs: &OUTPUTS,
        })?;
        let op = result.dataset(OP_DATASET)?;
        let points = result.dataset(NOISE_DATASET)?.num_points();
        tracing::debug!(
            variables = op.variables.len(),
            noise_points = points,
            "exploratory simulation done"
        );
        Ok(())
    }

    fn simulate_point(
        &mut self,
        bench: &Testbench,
        params: &ParamSet,
        settings: &RunSettings,
    ) -> Result<GridPointData> {
        let result = self.simulator.run(&SimRequest {
            testbench: bench,
            params,
            settings,
            outputs: &OUTPUTS,
        })?;
        GridPointData::from_result(&result)
    }
}

/// Characterise every device of a configuration in file order, calling
/// `before_device` ahead of each sweep.
pub fn characterise_all<S, F>(
    engine: &mut SweepEngine<S>,
    config: &CharConfig,
    mut before_device: F,
) -> Result<Vec<PathBuf>>
where
    S: Simulator,
    F: FnMut(&str),
{
    let mut written = Vec::with_capacity(config.devices.len());
    for (name, spec) in &config.devices {
        before_device(name);
        let request = SweepRequest::from_device(name, spec, &config.pvt)?;
        written.push(engine.run_device(&request)?);
    }
    Ok(written)
}

/// Path helper used by tools that look up a device's record.
pub fn record_path(results_dir: &Path, device: &str) -> PathBuf {
    results_dir.join(format!("{}.json", device))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_follow_sweep_nesting() {
        let grid = SweepGrid {
            l: vec![1.0, 2.0],
            vds: vec![0.0, 0.5],
            vbs: vec![0.0, -0.5],
            ids: vec![1e-6],
        };
        let order: Vec<[usize; 4]> = grid.points().map(|p| p.index).collect();
        assert_eq!(order.len(), 8);
        assert_eq!(order[0], [0, 0, 0, 0]);
        assert_eq!(order[1], [0, 1, 0, 0]);
        assert_eq!(order[2], [0, 0, 1, 0]);
        assert_eq!(order[4], [1, 0, 0, 0]);
    }

    #[test]
    fn point_params_keep_base_values() {
        let mut base = ParamSet::new();
        base.set("vdd", 1.8);
        let point = GridPoint {
            index: [0; 4],
            l: 0.15e-6,
            vds: 0.9,
            vbs: 0.0,
            ids: 1e-6,
        };
        let params = point.params(&base);
        let names: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["vdd", "vbs", "vds", "l", "ids"]);
        assert_eq!(params.get("ids"), Some(1e-6));
    }
}
