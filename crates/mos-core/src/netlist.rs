//! Characterisation test-bench rendering.
//!
//! A test bench is plain SPICE text with two placeholders, `{device}` for
//! the model name of the device under test and `{save}` for the save list.
//! Sweep parameters are not patched into the text; they are kept in a
//! `ParamSet` and emitted as a `.param` block right after the title line
//! every time the bench is rendered.

use std::path::Path;

use indexmap::IndexMap;

use crate::config::SimulatorKind;
use crate::error::Result;

pub const DEVICE_PLACEHOLDER: &str = "{device}";
pub const SAVE_PLACEHOLDER: &str = "{save}";

/// Ordered netlist parameter values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    values: IndexMap<String, f64>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: f64) -> &mut Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `name=value` pairs for log lines.
    pub fn describe(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, format_param_value(v)))
            .collect::<Vec<_>>()
            .join("  ")
    }
}

/// `.param` value text: shortest scientific form that parses back to the
/// same `f64`, e.g. `1.1242100350620886e-6`.
pub fn format_param_value(value: f64) -> String {
    format!("{:e}", value)
}

/// Temperature / corner settings applied on top of a bench.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub temperature: f64,
    pub corner: String,
    pub library: Option<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            temperature: 27.0,
            corner: "tt".to_string(),
            library: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Testbench {
    template: String,
}

impl Testbench {
    pub fn new(template: impl Into<String>) -> Self {
        let template: String = template.into();
        // continuation lines are folded so every statement sits on one line
        Self {
            template: template.replace("\n+", " "),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(std::fs::read_to_string(path)?))
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Bench specialised for one device model and save list.
    pub fn for_device(&self, device: &str, save_list: &str) -> Self {
        Self {
            template: self
                .template
                .replace(DEVICE_PLACEHOLDER, device)
                .replace(SAVE_PLACEHOLDER, save_list.trim_end()),
        }
    }

    /// Full netlist text for one simulation run.
    pub fn render(&self, kind: SimulatorKind, params: &ParamSet, settings: &RunSettings) -> String {
        let (title, body) = match self.template.split_once('\n') {
            Some((title, body)) => (title, body),
            None => (self.template.as_str(), ""),
        };

        let mut out = String::new();
        out.push_str(title);
        out.push('\n');
        if kind == SimulatorKind::Spectre {
            out.push_str("simulator lang=spice\n");
        }
        for (name, value) in params.iter() {
            out.push_str(&format!(".param {}={}\n", name, format_param_value(value)));
        }
        match kind {
            SimulatorKind::Xyce => {
                out.push_str(&format!(".options device temp={}\n", settings.temperature))
            }
            _ => out.push_str(&format!(".temp {}\n", settings.temperature)),
        }
        if let Some(library) = &settings.library {
            out.push_str(&format!(".lib {} {}\n", library, settings.corner));
        }
        out.push_str(body);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}
