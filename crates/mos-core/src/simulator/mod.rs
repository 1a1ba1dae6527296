//! Simulator capability interface.
//!
//! The sweep engine talks to a simulator only through [`Simulator::run`]:
//! a rendered test bench plus a parameter set goes in, named datasets of
//! real or complex signals come out. `SpiceSimulator` drives the external
//! ngspice / Xyce / Spectre binaries; tests plug in an in-memory fake.

pub mod rawfile;
pub mod spice;

use indexmap::IndexMap;
use num_complex::Complex64;

use crate::error::{CharError, Result, SimulationError};
use crate::netlist::{ParamSet, RunSettings, Testbench};

pub use rawfile::parse_rawfile;
pub use spice::SpiceSimulator;

/// One simulation invocation.
#[derive(Debug, Clone)]
pub struct SimRequest<'a> {
    pub testbench: &'a Testbench,
    pub params: &'a ParamSet,
    pub settings: &'a RunSettings,
    /// Output datasets to load, e.g. `op1`, `noise1`.
    pub outputs: &'a [&'a str],
}

pub trait Simulator {
    fn run(&mut self, request: &SimRequest<'_>) -> std::result::Result<SimResult, SimulationError>;
}

/// A column of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub unit: String,
}

/// One analysis result: variables (columns) and points (rows).
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub plotname: String,
    pub variables: Vec<Variable>,
    pub rows: Vec<Vec<Complex64>>,
}

impl Dataset {
    pub fn new(name: &str, variables: Vec<Variable>) -> Self {
        Self {
            name: name.to_string(),
            plotname: String::new(),
            variables,
            rows: Vec::new(),
        }
    }

    /// Dataset of real columns, `columns[var][point]`.
    pub fn from_real_columns(name: &str, columns: &[(&str, &str, Vec<f64>)]) -> Self {
        let variables = columns
            .iter()
            .map(|(n, u, _)| Variable {
                name: n.to_string(),
                unit: u.to_string(),
            })
            .collect();
        let points = columns.iter().map(|(_, _, v)| v.len()).max().unwrap_or(0);
        let rows = (0..points)
            .map(|p| {
                columns
                    .iter()
                    .map(|(_, _, v)| Complex64::new(v.get(p).copied().unwrap_or(0.0), 0.0))
                    .collect()
            })
            .collect();
        Self {
            name: name.to_string(),
            plotname: String::new(),
            variables,
            rows,
        }
    }

    pub fn num_points(&self) -> usize {
        self.rows.len()
    }

    /// Column index of a variable; names compare case-insensitively.
    pub fn find_variable(&self, name: &str) -> Option<usize> {
        let lower = name.to_ascii_lowercase();
        self.variables
            .iter()
            .position(|v| v.name.to_ascii_lowercase() == lower)
    }

    pub fn column(&self, index: usize) -> Vec<Complex64> {
        self.rows
            .iter()
            .map(|row| row.get(index).copied().unwrap_or_default())
            .collect()
    }

    pub fn complex_signal(&self, name: &str) -> Result<Vec<Complex64>> {
        let index = self
            .find_variable(name)
            .ok_or_else(|| CharError::SignalNotFound(name.to_string()))?;
        Ok(self.column(index))
    }

    /// Real part of a signal.
    pub fn signal(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self.complex_signal(name)?.into_iter().map(|c| c.re).collect())
    }

    /// Values of the swept variable (first column).
    pub fn swept_values(&self) -> Vec<f64> {
        self.column(0).into_iter().map(|c| c.re).collect()
    }
}

/// Datasets of one simulation run, keyed by output name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimResult {
    pub datasets: IndexMap<String, Dataset>,
}

impl SimResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dataset: Dataset) {
        self.datasets.insert(dataset.name.clone(), dataset);
    }

    pub fn dataset(&self, name: &str) -> Result<&Dataset> {
        self.datasets
            .get(name)
            .ok_or_else(|| CharError::DatasetNotFound(name.to_string()))
    }

    pub fn get_signal(&self, name: &str, dataset: &str) -> Result<Vec<f64>> {
        self.dataset(dataset)?.signal(name)
    }

    pub fn get_complex_signal(&self, name: &str, dataset: &str) -> Result<Vec<Complex64>> {
        self.dataset(dataset)?.complex_signal(name)
    }

    pub fn get_swept_values(&self, dataset: &str) -> Result<Vec<f64>> {
        Ok(self.dataset(dataset)?.swept_values())
    }

    /// Variable names of one dataset, in column order.
    pub fn variables(&self, dataset: &str) -> Result<Vec<&str>> {
        Ok(self
            .dataset(dataset)?
            .variables
            .iter()
            .map(|v| v.name.as_str())
            .collect())
    }
}
