pub mod config;
pub mod error;
pub mod grid;
pub mod measure;
pub mod netlist;
pub mod noise;
pub mod query;
pub mod simulator;
pub mod store;
pub mod sweep;
pub mod table;

pub use error::{CharError, Result};
