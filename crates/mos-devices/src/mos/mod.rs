//! MOSFET characterisation vocabulary
//!
//! Shared definitions used by the sweep engine, the characterisation store
//! and the query layer. Nothing in here touches a simulator or the disk.
//!
//! ## Module Structure
//!
//! - `types`: device polarity (MosType) and operating region (MosRegion)
//! - `params`: operating-point parameter names, noise table names and
//!   simulator save-list expressions
//!
//! ## Usage
//!
//! ```ignore
//! use mos_devices::mos::{bracketed_param, classify_region, MosType};
//!
//! assert_eq!(bracketed_param("@m.xm.mnfet[gm]"), Some("gm"));
//! let region = classify_region(MosType::Nmos, 0.9, 0.45, 1.2, 0.3);
//! ```

pub mod params;
pub mod types;

pub use params::{
    bracketed_param, save_expression, save_list, NOISE_CORNER, NOISE_FIELDS, NOISE_SLOPE,
    NOISE_THERMAL, OP_PARAMS,
};
pub use types::{classify_region, MosRegion, MosType};
