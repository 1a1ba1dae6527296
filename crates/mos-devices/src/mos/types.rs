//! MOSFET type definitions
//!
//! Polarity of the device under test and the operating region derived
//! from its bias point.

use serde::{Deserialize, Serialize};

/// MOSFET device type (NMOS or PMOS)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MosType {
    Nmos,
    Pmos,
}

impl Default for MosType {
    fn default() -> Self {
        MosType::Nmos
    }
}

impl MosType {
    /// Sign that maps PMOS bias voltages onto the NMOS convention.
    pub fn sign(self) -> f64 {
        match self {
            MosType::Nmos => 1.0,
            MosType::Pmos => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MosType::Nmos => "nmos",
            MosType::Pmos => "pmos",
        }
    }
}

impl std::fmt::Display for MosType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating region of the MOSFET
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MosRegion {
    /// Cutoff: Vgs < Vth
    Cutoff,
    /// Linear/Triode: Vgs > Vth, Vds < Vdsat
    Linear,
    /// Saturation: Vgs > Vth, Vds >= Vdsat
    Saturation,
}

impl Default for MosRegion {
    fn default() -> Self {
        MosRegion::Cutoff
    }
}

/// Classify the operating region from simulator-reported bias values.
///
/// PMOS values are taken as reported (negative Vgs/Vds/Vth) and folded
/// onto the NMOS convention. Vdsat is reported positive by most models, so
/// only its magnitude is used.
pub fn classify_region(mos_type: MosType, vgs: f64, vth: f64, vds: f64, vdsat: f64) -> MosRegion {
    let sign = mos_type.sign();
    let vgs = sign * vgs;
    let vth = sign * vth;
    let vds = sign * vds;
    if vgs < vth {
        MosRegion::Cutoff
    } else if vds < vdsat.abs() {
        MosRegion::Linear
    } else {
        MosRegion::Saturation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nmos_regions() {
        assert_eq!(classify_region(MosType::Nmos, 0.3, 0.45, 1.0, 0.1), MosRegion::Cutoff);
        assert_eq!(classify_region(MosType::Nmos, 1.0, 0.45, 0.1, 0.4), MosRegion::Linear);
        assert_eq!(classify_region(MosType::Nmos, 1.0, 0.45, 1.2, 0.4), MosRegion::Saturation);
    }

    #[test]
    fn pmos_regions_use_folded_bias() {
        assert_eq!(classify_region(MosType::Pmos, -1.0, -0.5, -1.2, 0.3), MosRegion::Saturation);
        assert_eq!(classify_region(MosType::Pmos, -0.2, -0.5, -1.2, 0.3), MosRegion::Cutoff);
    }

    #[test]
    fn polarity_display_and_sign() {
        assert_eq!(MosType::default().to_string(), "nmos");
        assert_eq!(MosType::Pmos.sign(), -1.0);
    }
}
