//! Request and response bodies of the lookup service.

use mos_core::query::{Conditions, OverlayPoint, QueryValue};
use mos_core::store::AxisValues;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub expression: String,
    #[serde(default)]
    pub conditions: Conditions,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub expression: String,
    pub value: QueryValue,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlayResponse {
    pub expression: String,
    pub points: Vec<OverlayPoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingRequest {
    pub original: String,
    pub matching: String,
    pub value: f64,
    #[serde(default)]
    pub conditions: Conditions,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchingResponse {
    pub original: String,
    pub matching: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamesResponse {
    pub names: Vec<String>,
}

/// Axis values with text axes decoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParameterValues {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl From<&AxisValues> for ParameterValues {
    fn from(values: &AxisValues) -> Self {
        match values {
            AxisValues::Numeric { values } => ParameterValues::Numeric(values.clone()),
            AxisValues::Bytes { .. } => {
                ParameterValues::Text(values.as_strings().unwrap_or_default())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterResponse {
    pub name: String,
    pub values: ParameterValues,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}
