//! Operating-point and noise parameter names
//!
//! The operating-point list is what the characterisation bench asks the
//! simulator to save for the device under test; the noise names are the
//! three tables derived from the output-noise spectrum.

/// Operating-point parameters saved for every grid point.
pub const OP_PARAMS: [&str; 15] = [
    "id", "vth", "vgs", "vds", "vbs", "gm", "gds", "gmbs", "vdsat", "cgg", "cgs", "cgd", "cgb",
    "cbs", "cdd",
];

/// Flicker corner frequency table [Hz]
pub const NOISE_CORNER: &str = "noise_corner";
/// Flicker slope exponent table
pub const NOISE_SLOPE: &str = "noise_slope";
/// Thermal noise floor table
pub const NOISE_THERMAL: &str = "noise_thermal";

pub const NOISE_FIELDS: [&str; 3] = [NOISE_CORNER, NOISE_SLOPE, NOISE_THERMAL];

/// Save expression for one operating-point parameter of the device under
/// test, e.g. `@M.XM.msky130_fd_pr__nfet_01v8[gm]`.
pub fn save_expression(device: &str, param: &str) -> String {
    format!("@M.XM.m{}[{}]", device, param)
}

/// Space separated save list for all of `params`.
pub fn save_list(device: &str, params: &[&str]) -> String {
    let mut out = String::new();
    for param in params {
        out.push_str(&save_expression(device, param));
        out.push(' ');
    }
    out
}

/// Extract the bracketed parameter name from a saved signal name.
///
/// Returns `None` for signals without a `[`; those are other simulator
/// signals that share the save list and are skipped by callers.
pub fn bracketed_param(signal: &str) -> Option<&str> {
    let (_, after) = signal.split_once('[')?;
    after.split(']').next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracketed_names() {
        assert_eq!(bracketed_param("@m.xm.mnfet[gm]"), Some("gm"));
        assert_eq!(bracketed_param("v(@m.xm.mnfet[vdsat])"), Some("vdsat"));
        assert_eq!(bracketed_param("v(d)"), None);
        assert_eq!(bracketed_param("frequency"), None);
    }

    #[test]
    fn save_list_covers_every_param() {
        let list = save_list("nfet", &["id", "gm"]);
        assert_eq!(list, "@M.XM.mnfet[id] @M.XM.mnfet[gm] ");
    }
}
