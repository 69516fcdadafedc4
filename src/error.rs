//! Crate error type.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::metadata::Column;

/// Alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Entity table does not satisfy the manifest schema.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("missing required column `{0}`")]
    MissingColumn(Column),
    #[error("column `{column}` has no value for entity `{entity}`")]
    MissingValue { column: Column, entity: String },
    #[error(
        "columns `module` and `type` must be present together (module present: {module}, type present: {series_type})"
    )]
    UnpairedSeriesKind { module: bool, series_type: bool },
}

/// Which of the two point sets an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointSide {
    Source,
    Target,
}

impl fmt::Display for PointSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointSide::Source => f.write_str("source"),
            PointSide::Target => f.write_str("target"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(
        "target point {target} is nearest to {observed} source points, more than the allowed {bound}"
    )]
    FanOut {
        observed: usize,
        bound: usize,
        target: usize,
    },

    #[error("{side} points have no `{column}` column")]
    MissingCoordinates { side: PointSide, column: String },

    #[error("{side} point {row} has a non-numeric or non-finite `{column}`")]
    InvalidCoordinate {
        side: PointSide,
        row: usize,
        column: String,
    },

    #[error("cannot match source points against an empty target set")]
    EmptyTarget,

    #[error("duplicate entity identifier `{0}`")]
    DuplicateIdentifier(String),

    #[error("entity `{0}` not found in source")]
    UnknownEntity(String),

    #[error("identifier column `{0}` not found in source metadata")]
    MissingIdentifier(String),

    #[error("entity index {index} out of range for {len} entities")]
    EntityIndex { index: usize, len: usize },

    #[error("invalid value `{value}` for column `{column}` of entity `{entity}`")]
    InvalidValue {
        column: String,
        entity: String,
        value: String,
    },

    #[error("{context}: expected {expected} values, got {actual}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("cannot combine tables keyed by `{expected}` and `{found}`")]
    IdColumnMismatch { expected: String, found: String },

    #[error("file template `{0}` must contain exactly one `{{}}` slot")]
    InvalidTemplate(String),

    #[error("resolution not given and time index has fewer than two timestamps")]
    UnknownResolution,

    #[error("cannot parse timestamp `{0}`")]
    InvalidTimestamp(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
