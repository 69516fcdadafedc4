//! Tabular simulation output: per-entity metadata, a time index, and a
//! (time × entity) profile array for one quantity.

mod files;

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use files::{CsvSource, parse_timestamp, read_meta, read_profiles};

/// A single metadata cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Interprets text as a number when it reads as one: integer, then
    /// float, then text.
    ///
    /// This is lossy (`007` becomes `7`), so it is only applied to numeric
    /// manifest columns; metadata cells are kept as read.
    pub fn parse(cell: &str) -> Self {
        let trimmed = cell.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            Scalar::Integer(i)
        } else if let Ok(f) = trimmed.parse::<f64>() {
            Scalar::Float(f)
        } else {
            Scalar::Text(cell.to_string())
        }
    }

    /// Numeric value, if this cell is a number or text that reads as one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Text rendering used for identifiers and string-valued manifest
    /// columns. Text cells come back unchanged.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Integer(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Integer(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// Ordered metadata rows sharing one header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaTable {
    columns: Vec<String>,
    rows: Vec<Vec<Scalar>>,
}

impl MetaTable {
    /// Creates an empty table with the given header.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row; it must have one cell per column.
    pub fn push_row(&mut self, row: Vec<Scalar>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::LengthMismatch {
                context: "metadata row",
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `row` in column `name`.
    pub fn get(&self, row: usize, name: &str) -> Option<&Scalar> {
        let col = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// All cells of column `name` in row order, or `None` if the column is absent.
    pub fn column(&self, name: &str) -> Option<Vec<&Scalar>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[col]).collect())
    }

    /// Identifiers from `id_column`, in row order.
    pub fn identifiers(&self, id_column: &str) -> Result<Vec<String>> {
        let cells = self
            .column(id_column)
            .ok_or_else(|| Error::MissingIdentifier(id_column.to_string()))?;
        Ok(cells.into_iter().map(Scalar::to_text).collect())
    }

    /// Row position of the entity whose `id_column` equals `id`.
    pub fn position_of(&self, id_column: &str, id: &str) -> Option<usize> {
        let col = self.column_index(id_column)?;
        self.rows.iter().position(|r| r[col].to_text() == id)
    }
}

/// Profile values for one quantity, indexed as (time, entity).
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileMatrix {
    n_entities: usize,
    rows: Vec<Vec<f64>>,
}

impl ProfileMatrix {
    /// Builds a matrix from time-major rows, each `n_entities` wide.
    pub fn from_rows(n_entities: usize, rows: Vec<Vec<f64>>) -> Result<Self> {
        if let Some(bad) = rows.iter().find(|r| r.len() != n_entities) {
            return Err(Error::LengthMismatch {
                context: "profile row",
                expected: n_entities,
                actual: bad.len(),
            });
        }
        Ok(Self { n_entities, rows })
    }

    pub fn n_times(&self) -> usize {
        self.rows.len()
    }

    pub fn n_entities(&self) -> usize {
        self.n_entities
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// One entity's series across the whole time axis.
    pub fn column(&self, entity: usize) -> Result<Vec<f64>> {
        if entity >= self.n_entities {
            return Err(Error::EntityIndex {
                index: entity,
                len: self.n_entities,
            });
        }
        Ok(self.rows.iter().map(|r| r[entity]).collect())
    }
}

/// Read access to one simulation output.
///
/// Entities in [`ProfileSource::meta`] and the columns of
/// [`ProfileSource::profiles`] share the same order.
pub trait ProfileSource {
    fn meta(&self) -> &MetaTable;

    fn time_index(&self) -> &[NaiveDateTime];

    /// The full (time × entity) array.
    fn profiles(&self) -> Result<ProfileMatrix>;

    /// Series for the entity at row `entity` of the metadata.
    fn profile(&self, entity: usize) -> Result<Vec<f64>> {
        self.profiles()?.column(entity)
    }
}
