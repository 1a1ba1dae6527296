//! Characterisation configuration.
//!
//! Everything the sweep needs is passed in explicitly through these
//! structs; the library never reads the process environment. A single TOML
//! document holds the simulator choice, test-bench templates, PVT settings
//! and the device list:
//!
//! ```toml
//! [simulator]
//! kind = "ngspice"
//!
//! [pvt]
//! temperature = 27
//! corner = "tt"
//! supplies.vdd = { nominal = 1.8, range = [1.62, 1.98] }
//!
//! [devices.nfet_01v8]
//! w = 1e-6
//! l = [0.15e-6, 0.5e-6]
//! ids = [1e-9, 1e-3, 10]
//! vds = [0, 1.8, 11]
//! vbs = [0, -1.8, 11]
//! type = "nmos"
//! ```

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use mos_devices::mos::MosType;
use serde::{Deserialize, Serialize};

use crate::error::{CharError, Result};
use crate::grid::RangeSpec;

/// Simulator backend selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulatorKind {
    #[default]
    Ngspice,
    Xyce,
    Spectre,
}

impl SimulatorKind {
    pub fn default_executable(self) -> &'static str {
        match self {
            SimulatorKind::Ngspice => "ngspice",
            SimulatorKind::Xyce => "Xyce",
            SimulatorKind::Spectre => "spectre",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub kind: SimulatorKind,
    /// Executable override; defaults to the backend's usual binary name.
    pub executable: Option<String>,
    /// Directory for the netlist, log and result files.
    pub run_dir: PathBuf,
    /// File stem shared by the netlist, log and raw files.
    pub stem: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            kind: SimulatorKind::Ngspice,
            executable: None,
            run_dir: PathBuf::from("rundir"),
            stem: "spiceinterface_temp".to_string(),
        }
    }
}

impl SimulatorConfig {
    pub fn executable(&self) -> &str {
        self.executable
            .as_deref()
            .unwrap_or_else(|| self.kind.default_executable())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestbenchConfig {
    pub nmos: PathBuf,
    pub pmos: PathBuf,
    /// PDK library referenced by `.lib <library> <corner>`.
    pub library: Option<String>,
}

impl Default for TestbenchConfig {
    fn default() -> Self {
        Self {
            nmos: PathBuf::from("nmos_characterise.spice"),
            pmos: PathBuf::from("pmos_characterise.spice"),
            library: None,
        }
    }
}

impl TestbenchConfig {
    pub fn template_for(&self, mos_type: MosType) -> &Path {
        match mos_type {
            MosType::Nmos => &self.nmos,
            MosType::Pmos => &self.pmos,
        }
    }
}

/// Supply entry as written in the configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplySpec {
    pub nominal: Option<f64>,
    pub range: Option<[f64; 2]>,
}

/// A validated power domain.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerDomain {
    pub name: String,
    pub nominal: f64,
    pub low: Option<f64>,
    pub high: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PvtConfig {
    pub temperature: f64,
    pub corner: String,
    pub supplies: IndexMap<String, SupplySpec>,
}

impl Default for PvtConfig {
    fn default() -> Self {
        Self {
            temperature: 27.0,
            corner: "tt".to_string(),
            supplies: IndexMap::new(),
        }
    }
}

impl PvtConfig {
    pub fn power_domains(&self) -> Result<Vec<PowerDomain>> {
        self.supplies
            .iter()
            .map(|(name, spec)| {
                let nominal = spec.nominal.ok_or_else(|| {
                    CharError::Config(format!(
                        "no nominal voltage defined for power domain '{}'",
                        name
                    ))
                })?;
                Ok(PowerDomain {
                    name: name.clone(),
                    nominal,
                    low: spec.range.map(|r| r[0]),
                    high: spec.range.map(|r| r[1]),
                })
            })
            .collect()
    }

    pub fn nominal(&self, name: &str) -> Result<f64> {
        let spec = self.supplies.get(name).ok_or_else(|| {
            CharError::Config(format!("power domain '{}' is not defined", name))
        })?;
        spec.nominal.ok_or_else(|| {
            CharError::Config(format!(
                "no nominal voltage defined for power domain '{}'",
                name
            ))
        })
    }
}

/// What the sweep does when a grid point's simulation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the sweep and return the error.
    #[default]
    Abort,
    /// Log the failure and leave NaN in every table cell of that point.
    FillNan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub results_dir: PathBuf,
    pub on_failure: FailurePolicy,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            on_failure: FailurePolicy::Abort,
        }
    }
}

fn default_ids() -> RangeSpec {
    RangeSpec::new(1e-9, 1e-3, 10.0)
}

fn default_bias() -> RangeSpec {
    RangeSpec::new(0.0, 1.8, 11.0)
}

/// One device entry of the device list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub w: f64,
    pub l: Vec<f64>,
    #[serde(default = "default_ids")]
    pub ids: RangeSpec,
    #[serde(default = "default_bias")]
    pub vds: RangeSpec,
    #[serde(default = "default_bias")]
    pub vbs: RangeSpec,
    #[serde(default)]
    pub vdd: Option<f64>,
    #[serde(rename = "type", default)]
    pub mos_type: MosType,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub corner: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CharConfig {
    pub simulator: SimulatorConfig,
    pub testbench: TestbenchConfig,
    pub pvt: PvtConfig,
    pub sweep: SweepConfig,
    /// Devices in file order.
    pub devices: IndexMap<String, DeviceSpec>,
}

impl CharConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: CharConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pvt.power_domains()?;
        for (name, device) in &self.devices {
            if device.l.is_empty() {
                return Err(CharError::Config(format!(
                    "device '{}' has an empty length list",
                    name
                )));
            }
            if !(device.w > 0.0) {
                return Err(CharError::Config(format!(
                    "device '{}' needs a positive width, got {}",
                    name, device.w
                )));
            }
        }
        Ok(())
    }
}
