//! Reader for ASCII (nutmeg) raw files.
//!
//! Header fields:
//! - Title / Plotname / Flags
//! - No. Variables / No. Points
//! - Variables: one `index name type` line per column
//! - Values: point blocks, the first line carrying the point index
//!
//! Complex values are written as `re,im`. Binary raw files are rejected;
//! benches are expected to request ASCII output.

use num_complex::Complex64;

use crate::error::{CharError, Result};
use crate::simulator::{Dataset, Variable};

/// Parse an ASCII raw file into a dataset called `name`.
pub fn parse_rawfile(name: &str, text: &str) -> Result<Dataset> {
    let mut dataset = Dataset::new(name, Vec::new());
    let mut flags = String::new();
    let mut num_variables = 0usize;
    let mut num_points = 0usize;
    let mut in_variables = false;
    let mut values_at = None;

    let mut offset = 0usize;
    for line in text.split_inclusive('\n') {
        offset += line.len();
        let line = line.trim();

        if let Some(rest) = line.strip_prefix("Plotname:") {
            dataset.plotname = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Flags:") {
            flags = rest.trim().to_ascii_lowercase();
        } else if let Some(rest) = line.strip_prefix("No. Variables:") {
            num_variables = rest.trim().parse().map_err(|_| {
                CharError::RawFile(format!("invalid No. Variables: {}", rest.trim()))
            })?;
        } else if let Some(rest) = line.strip_prefix("No. Points:") {
            num_points = rest
                .trim()
                .parse()
                .map_err(|_| CharError::RawFile(format!("invalid No. Points: {}", rest.trim())))?;
        } else if line.starts_with("Variables:") {
            in_variables = true;
        } else if line.starts_with("Binary:") {
            return Err(CharError::RawFile(
                "binary raw files are not supported".to_string(),
            ));
        } else if line.starts_with("Values:") {
            values_at = Some(offset);
            break;
        } else if in_variables && !line.is_empty() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3 {
                dataset.variables.push(Variable {
                    name: parts[1].to_string(),
                    unit: parts[2].to_string(),
                });
            }
        }
    }

    let values_at =
        values_at.ok_or_else(|| CharError::RawFile("Values: marker not found".to_string()))?;
    if dataset.variables.len() != num_variables {
        return Err(CharError::RawFile(format!(
            "expected {} variables, found {}",
            num_variables,
            dataset.variables.len()
        )));
    }
    let is_complex = flags.contains("complex");

    let data = &text[values_at..];

    let mut row: Vec<Complex64> = Vec::with_capacity(num_variables);
    let mut expecting_index = true;
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let token = if expecting_index {
            let mut parts = line.split_whitespace();
            parts.next();
            expecting_index = false;
            match parts.next() {
                Some(value) => value,
                None => continue,
            }
        } else {
            line
        };
        row.push(parse_value(token, is_complex)?);

        if row.len() == num_variables {
            dataset.rows.push(std::mem::take(&mut row));
            row = Vec::with_capacity(num_variables);
            expecting_index = true;
        }
    }

    if dataset.rows.len() != num_points {
        return Err(CharError::RawFile(format!(
            "expected {} points, found {}",
            num_points,
            dataset.rows.len()
        )));
    }
    Ok(dataset)
}

fn parse_value(token: &str, is_complex: bool) -> Result<Complex64> {
    let bad = || CharError::RawFile(format!("invalid value: {}", token));
    if is_complex {
        if let Some((re, im)) = token.split_once(',') {
            let re = re.trim().parse::<f64>().map_err(|_| bad())?;
            let im = im.trim().parse::<f64>().map_err(|_| bad())?;
            return Ok(Complex64::new(re, im));
        }
    }
    let re = token.parse::<f64>().map_err(|_| bad())?;
    Ok(Complex64::new(re, 0.0))
}
