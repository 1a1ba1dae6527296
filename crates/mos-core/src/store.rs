//! Characterisation store.
//!
//! One JSON container per device:
//!
//! ```text
//! {
//!   "format": "mos-characterisation/1",
//!   "w": 1e-6,
//!   "indexing": {
//!     "order": [{"name": "vbs", "position": 0}, ...],
//!     "vbs": {"kind": "numeric", "values": [...]},
//!     ...
//!   },
//!   "id": {"shape": [nl, nvds, nvbs, ncur], "data": [...]},
//!   "gm": {"shape": [nl, nvds, nvbs, ncur], "data": [...]},
//!   ...
//! }
//! ```
//!
//! Tables sit at the top level next to `w` and `indexing`, so those two
//! names (and `format`) cannot be used for tables.
//! Axis `p` of the declared order indexes table dimension
//! `len(order) - 1 - p`; the current-sweep index is always the last
//! dimension and is not named in the index. NaN cells are stored as `null`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::marker::PhantomData;
use std::path::Path;

use indexmap::IndexMap;
use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CharError, Result};
use crate::table::Table;

pub const FORMAT: &str = "mos-characterisation/1";
pub const FORMAT_FIELD: &str = "format";
pub const INDEXING: &str = "indexing";
pub const ORDER: &str = "order";
pub const WIDTH: &str = "w";

/// Width of the fixed-size byte strings used for text axes.
pub const TEXT_WIDTH: usize = 10;

/// Values along one named axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AxisValues {
    Numeric { values: Vec<f64> },
    /// ASCII strings, NUL padded or truncated to `width` bytes.
    Bytes { width: usize, values: Vec<Vec<u8>> },
}

impl AxisValues {
    pub fn numeric(values: Vec<f64>) -> Self {
        AxisValues::Numeric { values }
    }

    /// Encode strings as fixed-width ASCII; non-ASCII characters are dropped.
    pub fn text<S: AsRef<str>>(values: &[S]) -> Self {
        let values = values
            .iter()
            .map(|s| {
                let mut bytes: Vec<u8> = s
                    .as_ref()
                    .chars()
                    .filter(char::is_ascii)
                    .map(|c| c as u8)
                    .take(TEXT_WIDTH)
                    .collect();
                bytes.resize(TEXT_WIDTH, 0);
                bytes
            })
            .collect();
        AxisValues::Bytes {
            width: TEXT_WIDTH,
            values,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AxisValues::Numeric { values } => values.len(),
            AxisValues::Bytes { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            AxisValues::Numeric { values } => Some(values),
            AxisValues::Bytes { .. } => None,
        }
    }

    /// Decoded strings with the padding removed.
    pub fn as_strings(&self) -> Option<Vec<String>> {
        match self {
            AxisValues::Numeric { .. } => None,
            AxisValues::Bytes { values, .. } => Some(
                values
                    .iter()
                    .map(|b| {
                        let end = b.iter().position(|&c| c == 0).unwrap_or(b.len());
                        String::from_utf8_lossy(&b[..end]).into_owned()
                    })
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEntry {
    pub name: String,
    pub position: usize,
}

/// Axis index: declared order plus one value list per named axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indexing {
    pub order: Vec<OrderEntry>,
    #[serde(flatten)]
    pub axes: IndexMap<String, AxisValues>,
}

impl Indexing {
    /// Build an index from axes listed in declared order.
    pub fn new(axes: Vec<(&str, AxisValues)>) -> Self {
        let order = axes
            .iter()
            .enumerate()
            .map(|(position, (name, _))| OrderEntry {
                name: name.to_string(),
                position,
            })
            .collect();
        Self {
            order,
            axes: axes
                .into_iter()
                .map(|(name, values)| (name.to_string(), values))
                .collect(),
        }
    }

    /// Declared position of an axis.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.order
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.position)
    }

    /// Table dimension indexed by an axis.
    pub fn table_dimension(&self, name: &str) -> Option<usize> {
        let position = self.position(name)?;
        (position < self.order.len()).then(|| self.order.len() - 1 - position)
    }

    pub fn axis_names(&self) -> Vec<String> {
        self.axes
            .keys()
            .filter(|name| name.as_str() != ORDER)
            .cloned()
            .collect()
    }

    pub fn values(&self, name: &str) -> Option<&AxisValues> {
        self.axes.get(name)
    }

    /// Table shape implied by the axes, without the current dimension.
    pub fn named_shape(&self) -> Result<Vec<usize>> {
        let mut shape = vec![0; self.order.len()];
        for entry in &self.order {
            let values = self.axes.get(&entry.name).ok_or_else(|| {
                CharError::Store(format!("axis '{}' has no values", entry.name))
            })?;
            let dim = self.table_dimension(&entry.name).ok_or_else(|| {
                CharError::Store(format!(
                    "axis '{}' has position {} outside the order",
                    entry.name, entry.position
                ))
            })?;
            shape[dim] = values.len();
        }
        Ok(shape)
    }
}

/// Complete persisted characterisation of one device.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterisationRecord {
    pub tables: BTreeMap<String, Table>,
    pub w: f64,
    pub indexing: Indexing,
}

#[derive(Serialize)]
struct Container<'a> {
    format: &'a str,
    w: f64,
    indexing: &'a Indexing,
    #[serde(flatten)]
    tables: &'a BTreeMap<String, Table>,
}

/// Container as read back. Every top-level key other than `format`, `w`
/// and `indexing` is a table, decoded as `T`; `IgnoredAny` skips the
/// table contents.
struct ReadContainer<T> {
    format: String,
    w: f64,
    indexing: Indexing,
    tables: BTreeMap<String, T>,
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for ReadContainer<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(ContainerVisitor(PhantomData))
    }
}

struct ContainerVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for ContainerVisitor<T> {
    type Value = ReadContainer<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a characterisation container")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut format = None;
        let mut w = None;
        let mut indexing = None;
        let mut tables = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                FORMAT_FIELD => format = Some(map.next_value()?),
                WIDTH => w = Some(map.next_value()?),
                INDEXING => indexing = Some(map.next_value()?),
                _ => {
                    let table = map.next_value()?;
                    tables.insert(key, table);
                }
            }
        }
        Ok(ReadContainer {
            format: format.ok_or_else(|| <A::Error as de::Error>::missing_field(FORMAT_FIELD))?,
            w: w.ok_or_else(|| <A::Error as de::Error>::missing_field(WIDTH))?,
            indexing: indexing.ok_or_else(|| <A::Error as de::Error>::missing_field(INDEXING))?,
            tables,
        })
    }
}

/// Metadata read without materialising any table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSummary {
    pub w: f64,
    pub indexing: Indexing,
    pub tables: Vec<String>,
}

impl StoreSummary {
    pub fn field_names(&self) -> Vec<String> {
        field_names(self.tables.iter())
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.indexing.axis_names()
    }
}

fn field_names<'a>(tables: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut names: BTreeSet<String> = tables.cloned().collect();
    names.insert(INDEXING.to_string());
    names.insert(WIDTH.to_string());
    names.into_iter().collect()
}

fn check_format(format: &str) -> Result<()> {
    if format != FORMAT {
        return Err(CharError::Store(format!(
            "unsupported container format '{}'",
            format
        )));
    }
    Ok(())
}

impl CharacterisationRecord {
    pub fn new(tables: BTreeMap<String, Table>, w: f64, indexing: Indexing) -> Result<Self> {
        let record = Self {
            tables,
            w,
            indexing,
        };
        record.validate()?;
        Ok(record)
    }

    /// Every table must have the named-axis shape plus one current dimension
    /// and a name that does not collide with the container's own keys.
    pub fn validate(&self) -> Result<()> {
        let named = self.indexing.named_shape()?;
        let mut expected: Option<&[usize]> = None;
        for (name, table) in &self.tables {
            if [FORMAT_FIELD, WIDTH, INDEXING].contains(&name.as_str()) {
                return Err(CharError::Store(format!(
                    "table name '{}' is reserved",
                    name
                )));
            }
            if table.ndim() != named.len() + 1 || table.shape[..named.len()] != named[..] {
                return Err(CharError::Store(format!(
                    "table '{}' has shape {:?}, axes imply {:?} + [current]",
                    name, table.shape, named
                )));
            }
            match expected {
                Some(shape) if shape != &table.shape[..] => {
                    return Err(CharError::Store(format!(
                        "table '{}' has shape {:?}, expected {:?}",
                        name, table.shape, shape
                    )));
                }
                Some(_) => {}
                None => expected = Some(table.shape.as_slice()),
            }
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn shape(&self) -> Option<&[usize]> {
        self.tables.values().next().map(|t| t.shape.as_slice())
    }

    pub fn field_names(&self) -> Vec<String> {
        field_names(self.tables.keys())
    }
}

/// Write a record, replacing any existing file.
pub fn write_record(path: &Path, record: &CharacterisationRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let container = Container {
        format: FORMAT,
        w: record.w,
        indexing: &record.indexing,
        tables: &record.tables,
    };
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &container)?;
    Ok(())
}

pub fn read_record(path: &Path) -> Result<CharacterisationRecord> {
    let reader = BufReader::new(File::open(path)?);
    let container: ReadContainer<Table> = serde_json::from_reader(reader)?;
    check_format(&container.format)?;
    CharacterisationRecord::new(container.tables, container.w, container.indexing)
}

/// Width, index and table names only; table contents are skipped.
pub fn read_summary(path: &Path) -> Result<StoreSummary> {
    let reader = BufReader::new(File::open(path)?);
    let container: ReadContainer<IgnoredAny> = serde_json::from_reader(reader)?;
    check_format(&container.format)?;
    Ok(StoreSummary {
        w: container.w,
        indexing: container.indexing,
        tables: container.tables.into_keys().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_axis_is_fixed_width() {
        let axis = AxisValues::text(&["tt", "ff_corner_long"]);
        match &axis {
            AxisValues::Bytes { width, values } => {
                assert_eq!(*width, TEXT_WIDTH);
                assert!(values.iter().all(|v| v.len() == TEXT_WIDTH));
            }
            AxisValues::Numeric { .. } => panic!("expected bytes"),
        }
        assert_eq!(
            axis.as_strings().unwrap(),
            vec!["tt".to_string(), "ff_corner_".to_string()]
        );
    }

    #[test]
    fn declared_order_maps_to_reversed_dimensions() {
        let indexing = Indexing::new(vec![
            ("vbs", AxisValues::numeric(vec![0.0])),
            ("vds", AxisValues::numeric(vec![0.0, 1.8, 3.0])),
            ("l", AxisValues::numeric(vec![0.15e-6, 1e-6])),
        ]);
        assert_eq!(indexing.table_dimension("vbs"), Some(2));
        assert_eq!(indexing.table_dimension("vds"), Some(1));
        assert_eq!(indexing.table_dimension("l"), Some(0));
        assert_eq!(indexing.table_dimension("id"), None);
        assert_eq!(indexing.named_shape().unwrap(), vec![2, 3, 1]);
    }

    #[test]
    fn mismatched_table_is_rejected() {
        let indexing = Indexing::new(vec![("l", AxisValues::numeric(vec![1e-6, 2e-6]))]);
        let mut tables = BTreeMap::new();
        tables.insert("id".to_string(), Table::zeros(&[3, 4]));
        assert!(CharacterisationRecord::new(tables, 1e-6, indexing).is_err());
    }
}
