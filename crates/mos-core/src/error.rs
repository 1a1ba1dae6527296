//! Error types for characterisation, storage and lookup.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for characterisation operations.
pub type Result<T> = std::result::Result<T, CharError>;

/// Errors raised by a single simulator invocation.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The simulator executable could not be started.
    #[error("failed to start {executable}: {message}")]
    Spawn { executable: String, message: String },

    /// The simulator exited with a non-zero status.
    #[error("simulator exited with {status}\n{log}")]
    Exit { status: String, log: String },

    /// The simulator log reports a fatal or aborted run.
    #[error("simulator reported a fatal error\n{log}")]
    Fatal { log: String },

    /// A requested output dataset was not written.
    #[error("result file not found: {path}")]
    MissingResult { path: PathBuf },

    /// A result file exists but could not be read.
    #[error("failed to read results: {0}")]
    Results(String),

    /// The simulation could not be prepared (run directory, netlist file).
    #[error("failed to prepare simulation: {0}")]
    Prepare(String),
}

/// Errors that can occur while characterising or querying a device.
#[derive(Debug, Error)]
pub enum CharError {
    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Axis name not present in the store index.
    #[error("Parameter ({axis}) not in valid list {valid:?}. Use get_parameter_names() to find suitable options")]
    UnknownAxis { axis: String, valid: Vec<String> },

    /// A required query condition was not supplied.
    #[error("missing condition: {0}")]
    MissingCondition(String),

    /// Query expression could not be parsed.
    #[error("invalid expression '{0}'")]
    Expression(String),

    /// Query conditions cannot be applied as given.
    #[error("invalid condition: {0}")]
    Condition(String),

    /// Sweep range specification is unusable.
    #[error("invalid range for {name}: {message}")]
    InvalidRange { name: String, message: String },

    /// A simulation for one grid point failed.
    #[error("simulation failed: {0}")]
    Simulation(#[from] SimulationError),

    /// Dataset missing from the simulation results.
    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    /// Signal missing from a dataset.
    #[error("The provided signal ({0}) cannot be found in the simulation results")]
    SignalNotFound(String),

    /// Raw result file could not be parsed.
    #[error("failed to parse rawfile: {0}")]
    RawFile(String),

    /// Store content does not match the expected layout.
    #[error("store error: {0}")]
    Store(String),

    /// Named table not present in the store.
    #[error("field not found: {0}")]
    FieldNotFound(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
