//! Dense row-major N-dimensional tables.
//!
//! Every characterisation table is four-dimensional,
//! `[l][vds][vbs][current]`, with the current-sweep index innermost so a
//! fixed (l, vds, vbs) cell maps to one contiguous lane.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CharError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub shape: Vec<usize>,
    #[serde(serialize_with = "nan_as_null", deserialize_with = "null_as_nan")]
    pub data: Vec<f64>,
}

impl Table {
    pub fn zeros(shape: &[usize]) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; len],
        }
    }

    pub fn from_data(shape: &[usize], data: Vec<f64>) -> Result<Self> {
        let len: usize = shape.iter().product();
        if len != data.len() {
            return Err(CharError::Store(format!(
                "shape {:?} needs {} values, got {}",
                shape,
                len,
                data.len()
            )));
        }
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat offset of a full index, or `None` when out of bounds.
    pub fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0;
        for (i, (&idx, &dim)) in index.iter().zip(self.shape.iter()).enumerate() {
            if idx >= dim {
                return None;
            }
            offset = if i == 0 { idx } else { offset * dim + idx };
        }
        Some(offset)
    }

    pub fn get(&self, index: &[usize]) -> Option<f64> {
        self.offset(index).map(|o| self.data[o])
    }

    pub fn set(&mut self, index: &[usize], value: f64) -> bool {
        match self.offset(index) {
            Some(o) => {
                self.data[o] = value;
                true
            }
            None => false,
        }
    }

    /// Innermost lane for a prefix of `ndim - 1` indices.
    pub fn lane(&self, prefix: &[usize]) -> Option<&[f64]> {
        let inner = *self.shape.last()?;
        if prefix.len() + 1 != self.shape.len() {
            return None;
        }
        let mut index = prefix.to_vec();
        index.push(0);
        let start = self.offset(&index)?;
        Some(&self.data[start..start + inner])
    }
}

fn nan_as_null<S>(data: &[f64], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    use serde::ser::SerializeSeq;

    let mut seq = serializer.serialize_seq(Some(data.len()))?;
    for value in data {
        if value.is_finite() {
            seq.serialize_element(&Some(*value))?;
        } else {
            seq.serialize_element(&None::<f64>)?;
        }
    }
    seq.end()
}

fn null_as_nan<'de, D>(deserializer: D) -> std::result::Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Option<f64>>::deserialize(deserializer)?;
    Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}
