//! Lookup against a characterisation record.
//!
//! Conditions pick one index per named axis by nearest value (ties go to
//! the lower index); axes without a condition use index 0. The drain
//! current is swept rather than stored as an axis, so an `id` condition is
//! resolved by looking up the `id` lane under the remaining conditions and
//! taking the sample nearest to the requested current. Without an `id`
//! condition a query returns the whole current lane.

use std::f64::consts::PI;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use mos_devices::mos::{classify_region, MosRegion, MosType, NOISE_CORNER, NOISE_SLOPE, NOISE_THERMAL};
use serde::{Deserialize, Serialize};

use crate::error::{CharError, Result};
use crate::store::{read_record, AxisValues, CharacterisationRecord};

/// Pseudo-axis resolved through the `id` table.
pub const CURRENT_CONDITION: &str = "id";
pub const INTEGRATED_NOISE: &str = "integrated_noise";
pub const F_HI: &str = "f_hi";
pub const F_LO: &str = "f_lo";
pub const DEFAULT_F_LO: f64 = 0.01;

/// Condition value: a scalar target, a list for sweep overlays, or a
/// string for text-valued axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Value(f64),
    Sweep(Vec<f64>),
    Text(String),
}

impl From<f64> for Condition {
    fn from(value: f64) -> Self {
        Condition::Value(value)
    }
}

impl From<Vec<f64>> for Condition {
    fn from(values: Vec<f64>) -> Self {
        Condition::Sweep(values)
    }
}

impl From<&str> for Condition {
    fn from(value: &str) -> Self {
        Condition::Text(value.to_string())
    }
}

/// Ordered condition set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conditions(IndexMap<String, Condition>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Condition>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Condition>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Condition> {
        self.0.get(key)
    }

    /// Scalar value of a condition, if present and scalar.
    pub fn value(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(Condition::Value(v)) => Some(*v),
            _ => None,
        }
    }

    /// Copy of the set with one key removed, order preserved.
    pub fn without(&self, key: &str) -> Self {
        let mut copy = self.clone();
        copy.0.shift_remove(key);
        copy
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Condition>> FromIterator<(K, V)> for Conditions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Query result: one value when `id` is conditioned, else a current lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Scalar(f64),
    Lane(Vec<f64>),
}

impl QueryValue {
    pub fn values(&self) -> &[f64] {
        match self {
            QueryValue::Scalar(v) => std::slice::from_ref(v),
            QueryValue::Lane(v) => v,
        }
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            QueryValue::Scalar(v) => Some(*v),
            QueryValue::Lane(_) => None,
        }
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        match self {
            QueryValue::Scalar(v) => QueryValue::Scalar(f(*v)),
            QueryValue::Lane(v) => QueryValue::Lane(v.iter().map(|x| f(*x)).collect()),
        }
    }

    /// Elementwise combination; a scalar broadcasts against a lane.
    pub fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Result<Self> {
        Ok(match (self, other) {
            (QueryValue::Scalar(a), QueryValue::Scalar(b)) => QueryValue::Scalar(f(*a, *b)),
            (QueryValue::Scalar(a), QueryValue::Lane(b)) => {
                QueryValue::Lane(b.iter().map(|y| f(*a, *y)).collect())
            }
            (QueryValue::Lane(a), QueryValue::Scalar(b)) => {
                QueryValue::Lane(a.iter().map(|x| f(*x, *b)).collect())
            }
            (QueryValue::Lane(a), QueryValue::Lane(b)) => {
                if a.len() != b.len() {
                    return Err(CharError::Expression(format!(
                        "operands have {} and {} values",
                        a.len(),
                        b.len()
                    )));
                }
                QueryValue::Lane(a.iter().zip(b).map(|(x, y)| f(*x, *y)).collect())
            }
        })
    }
}

/// One side of a query expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Literal `1`.
    One,
    Param(String),
    /// `2*pi*name`
    Angular(String),
}

impl FromStr for Operand {
    type Err = CharError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "1" {
            return Ok(Operand::One);
        }
        let (angular, name) = match s.strip_prefix("2*pi*") {
            Some(name) => (true, name.trim()),
            None => (false, s),
        };
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(CharError::Expression(s.to_string()));
        }
        Ok(if angular {
            Operand::Angular(name.to_string())
        } else {
            Operand::Param(name.to_string())
        })
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::One => f.write_str("1"),
            Operand::Param(name) => f.write_str(name),
            Operand::Angular(name) => write!(f, "2*pi*{}", name),
        }
    }
}

/// `A` or `A/B`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Single(Operand),
    Ratio(Operand, Operand),
}

impl FromStr for Expression {
    type Err = CharError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [single] => Ok(Expression::Single(single.parse()?)),
            [num, den] => Ok(Expression::Ratio(num.parse()?, den.parse()?)),
            _ => Err(CharError::Expression(s.to_string())),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Single(op) => write!(f, "{}", op),
            Expression::Ratio(num, den) => write!(f, "{}/{}", num, den),
        }
    }
}

/// One combination of a sweep overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayPoint {
    pub conditions: Conditions,
    pub value: QueryValue,
}

/// Index of the value nearest to `target`; the first minimum wins and NaN
/// entries never match.
pub fn nearest_index(values: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.iter().enumerate() {
        let distance = (v - target).abs();
        match best {
            Some((_, d)) if !(distance < d) => {}
            _ if distance.is_nan() => {}
            _ => best = Some((i, distance)),
        }
    }
    best.map(|(i, _)| i)
}

/// Closed-form integral of `thermal * (1 + (corner / f)^slope)` from
/// `f_lo` to `f_hi`. Without a corner only the thermal floor integrates.
pub fn integrate_noise(thermal: f64, corner: f64, slope: f64, f_lo: f64, f_hi: f64) -> f64 {
    let white = (f_hi - f_lo) * thermal;
    if corner.is_nan() || slope.is_nan() {
        return white;
    }
    let m = thermal * corner.powf(slope);
    if slope == 1.0 {
        return white + m * (f_hi / f_lo).ln();
    }
    white + m / (1.0 - slope) * f_hi.powf(1.0 - slope) + m / (slope - 1.0) * f_lo.powf(1.0 - slope)
}

#[derive(Debug, Clone)]
pub struct QueryEngine {
    record: CharacterisationRecord,
}

impl QueryEngine {
    pub fn new(record: CharacterisationRecord) -> Self {
        Self { record }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(read_record(path)?))
    }

    pub fn record(&self) -> &CharacterisationRecord {
        &self.record
    }

    pub fn width(&self) -> f64 {
        self.record.w
    }

    /// Table names plus `w` and `indexing`, sorted.
    pub fn get_field_names(&self) -> Vec<String> {
        self.record.field_names()
    }

    /// Named axes of the store.
    pub fn get_parameter_names(&self) -> Vec<String> {
        self.record.indexing.axis_names()
    }

    pub fn get_parameter_values(&self, axis: &str) -> Result<&AxisValues> {
        self.record
            .indexing
            .values(axis)
            .ok_or_else(|| CharError::UnknownAxis {
                axis: axis.to_string(),
                valid: self.get_parameter_names(),
            })
    }

    /// Evaluate `A` or `A/B` where each side is `1`, a table name or
    /// `2*pi*name`.
    pub fn query(&self, expression: &str, conditions: &Conditions) -> Result<QueryValue> {
        let expression: Expression = expression.parse()?;
        self.evaluate(&expression, conditions)
    }

    pub fn evaluate(&self, expression: &Expression, conditions: &Conditions) -> Result<QueryValue> {
        match expression {
            Expression::Single(op) => self.operand(op, conditions),
            Expression::Ratio(num, den) => {
                let num = self.operand(num, conditions)?;
                let den = self.operand(den, conditions)?;
                num.zip_with(&den, |a, b| a / b)
            }
        }
    }

    fn operand(&self, operand: &Operand, conditions: &Conditions) -> Result<QueryValue> {
        match operand {
            Operand::One => Ok(QueryValue::Scalar(1.0)),
            Operand::Param(name) => self.query_single(name, conditions),
            Operand::Angular(name) => Ok(self.query_single(name, conditions)?.map(|v| 2.0 * PI * v)),
        }
    }

    /// Look up one table, or compute `integrated_noise`.
    pub fn query_single(&self, parameter: &str, conditions: &Conditions) -> Result<QueryValue> {
        if parameter == INTEGRATED_NOISE {
            let f_hi = conditions.value(F_HI).ok_or_else(|| {
                CharError::MissingCondition(format!(
                    "f_hi must be specified in conditions for {}",
                    INTEGRATED_NOISE
                ))
            })?;
            let f_lo = conditions.value(F_LO).unwrap_or(DEFAULT_F_LO);
            return self.integrated_noise(conditions, f_lo, f_hi);
        }

        let table = self
            .record
            .table(parameter)
            .ok_or_else(|| CharError::FieldNotFound(parameter.to_string()))?;
        let prefix = self.resolve_axes(conditions)?;

        match conditions.get(CURRENT_CONDITION) {
            None => {
                let lane = table.lane(&prefix).ok_or_else(|| {
                    CharError::Store(format!("table '{}' has no lane at {:?}", parameter, prefix))
                })?;
                Ok(QueryValue::Lane(lane.to_vec()))
            }
            Some(Condition::Value(target)) => {
                let index = self.current_index(*target, conditions)?;
                let mut full = prefix;
                full.push(index);
                let value = table.get(&full).ok_or_else(|| {
                    CharError::Store(format!("table '{}' has no cell at {:?}", parameter, full))
                })?;
                Ok(QueryValue::Scalar(value))
            }
            Some(_) => Err(CharError::Condition(
                "id must be a single value; use overlay for sweeps".to_string(),
            )),
        }
    }

    /// Table indices of the named axes, in table-dimension order.
    fn resolve_axes(&self, conditions: &Conditions) -> Result<Vec<usize>> {
        let indexing = &self.record.indexing;
        let mut prefix = vec![0; indexing.order.len()];
        for (key, condition) in conditions.iter() {
            let (Some(dim), Some(values)) = (indexing.table_dimension(key), indexing.values(key))
            else {
                continue;
            };
            prefix[dim] = axis_index(key, values, condition)?;
        }
        Ok(prefix)
    }

    /// Current-sweep index whose `id` is nearest to `target`.
    fn current_index(&self, target: f64, conditions: &Conditions) -> Result<usize> {
        let lane = self.query_single(CURRENT_CONDITION, &conditions.without(CURRENT_CONDITION))?;
        nearest_index(lane.values(), target).ok_or_else(|| {
            CharError::Condition(format!("no valid current sample near id={}", target))
        })
    }

    /// Integrated output noise between `f_lo` and `f_hi` from the stored
    /// thermal/corner/slope triples.
    pub fn integrated_noise(&self, conditions: &Conditions, f_lo: f64, f_hi: f64) -> Result<QueryValue> {
        let thermal = self.query_single(NOISE_THERMAL, conditions)?;
        let corner = self.query_single(NOISE_CORNER, conditions)?;
        let slope = self.query_single(NOISE_SLOPE, conditions)?;
        let (t, c, s) = (thermal.values(), corner.values(), slope.values());
        if t.len() != c.len() || t.len() != s.len() {
            return Err(CharError::Store("noise tables disagree in shape".to_string()));
        }
        let values: Vec<f64> = (0..t.len())
            .map(|i| integrate_noise(t[i], c[i], s[i], f_lo, f_hi))
            .collect();
        Ok(match thermal {
            QueryValue::Scalar(_) => QueryValue::Scalar(values[0]),
            QueryValue::Lane(_) => QueryValue::Lane(values),
        })
    }

    /// Query `matching` at the sample where `original` is nearest to `value`.
    pub fn get_matching_value(
        &self,
        original: &str,
        matching: &str,
        value: f64,
        conditions: &Conditions,
    ) -> Result<f64> {
        let original_values = self.query(original, conditions)?;
        let index = nearest_index(original_values.values(), value).ok_or_else(|| {
            CharError::Condition(format!("{} has no sample near {}", original, value))
        })?;
        let matching_values = self.query(matching, conditions)?;
        matching_values.values().get(index).copied().ok_or_else(|| {
            CharError::Condition(format!(
                "{} has {} samples, index {} requested",
                matching,
                matching_values.len(),
                index
            ))
        })
    }

    /// Evaluate `expression` once per combination of list-valued
    /// conditions, in condition order with the last list varying fastest.
    pub fn overlay(&self, expression: &str, conditions: &Conditions) -> Result<Vec<OverlayPoint>> {
        let expression: Expression = expression.parse()?;
        let mut combinations = vec![Conditions::new()];
        for (key, condition) in conditions.iter() {
            let choices: Vec<Condition> = match condition {
                Condition::Sweep(values) => values.iter().map(|v| Condition::Value(*v)).collect(),
                other => vec![other.clone()],
            };
            combinations = combinations
                .into_iter()
                .flat_map(|base| {
                    choices
                        .iter()
                        .map(move |choice| base.clone().with(key, choice.clone()))
                })
                .collect();
        }
        combinations
            .into_iter()
            .map(|conditions| {
                let value = self.evaluate(&expression, &conditions)?;
                Ok(OverlayPoint { conditions, value })
            })
            .collect()
    }

    /// Operating region of every sample selected by `conditions`.
    pub fn operating_region(&self, conditions: &Conditions, mos_type: MosType) -> Result<Vec<MosRegion>> {
        let vgs = self.query_single("vgs", conditions)?;
        let vth = self.query_single("vth", conditions)?;
        let vds = self.query_single("vds", conditions)?;
        let vdsat = self.query_single("vdsat", conditions)?;
        let (vgs, vth, vds, vdsat) = (vgs.values(), vth.values(), vds.values(), vdsat.values());
        Ok((0..vgs.len().min(vth.len()).min(vds.len()).min(vdsat.len()))
            .map(|i| classify_region(mos_type, vgs[i], vth[i], vds[i], vdsat[i]))
            .collect())
    }
}

fn axis_index(axis: &str, values: &AxisValues, condition: &Condition) -> Result<usize> {
    match (values, condition) {
        (AxisValues::Numeric { values }, Condition::Value(target)) => nearest_index(values, *target)
            .ok_or_else(|| CharError::Condition(format!("axis '{}' has no values", axis))),
        (AxisValues::Bytes { .. }, Condition::Text(target)) => values
            .as_strings()
            .and_then(|names| names.iter().position(|n| n == target))
            .ok_or_else(|| {
                CharError::Condition(format!("'{}' is not a value of axis '{}'", target, axis))
            }),
        (_, Condition::Sweep(_)) => Err(CharError::Condition(format!(
            "list given for '{}'; use overlay for sweeps",
            axis
        ))),
        (AxisValues::Numeric { .. }, Condition::Text(target)) => Err(CharError::Condition(format!(
            "axis '{}' is numeric, got '{}'",
            axis, target
        ))),
        (AxisValues::Bytes { .. }, Condition::Value(target)) => Err(CharError::Condition(format!(
            "axis '{}' holds strings, got {}",
            axis, target
        ))),
    }
}
