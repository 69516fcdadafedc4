//! One entity's row of the metadata table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, SchemaError};
use crate::io::ManifestEntry;
use crate::io::paths::relative_to;
use crate::metadata::Column;
use crate::source::Scalar;

/// Metadata for one entity.
///
/// Every taxonomy column is an explicit optional field; `None` means the
/// value has not been assigned yet. Columns outside the taxonomy live in
/// `extra` and are never exported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRecord {
    pub component_name: String,
    pub resolution: Option<f64>,
    pub normalization_factor: Option<Scalar>,
    pub category: Option<String>,
    pub simulation: Option<String>,
    pub name: Option<String>,
    pub data_file: Option<PathBuf>,
    pub module: Option<String>,
    pub series_type: Option<String>,
    pub scaling_factor_multiplier: Option<Scalar>,
    pub scaling_factor_multiplier_module: Option<String>,
    pub extra: BTreeMap<String, Scalar>,
}

impl EntityRecord {
    pub fn new(component_name: impl Into<String>) -> Self {
        Self {
            component_name: component_name.into(),
            ..Self::default()
        }
    }

    /// Returns `true` when `column` holds a value for this entity.
    pub fn has(&self, column: Column) -> bool {
        match column {
            Column::Resolution => self.resolution.is_some(),
            Column::NormalizationFactor => self.normalization_factor.is_some(),
            Column::Category => self.category.is_some(),
            Column::Simulation => self.simulation.is_some(),
            Column::Name => self.name.is_some(),
            Column::DataFile => self.data_file.is_some(),
            Column::Module => self.module.is_some(),
            Column::Type => self.series_type.is_some(),
            Column::ScalingFactorMultiplier => self.scaling_factor_multiplier.is_some(),
            Column::ScalingFactorMultiplierModule => {
                self.scaling_factor_multiplier_module.is_some()
            }
        }
    }

    /// Stores `value` in the field for `column`, converting it to the field's type.
    ///
    /// Text holding a number is stored as a number in the numeric columns
    /// (`resolution`, `normalization_factor`, `scaling_factor_multiplier`).
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` when `resolution` is not a finite number, or a
    /// numeric column gets `NaN` or an infinity, which JSON cannot carry.
    pub fn assign(&mut self, column: Column, value: Scalar) -> Result<()> {
        match column {
            Column::Resolution => {
                let secs = value
                    .as_f64()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| self.invalid(column, &value))?;
                self.resolution = Some(secs);
            }
            Column::NormalizationFactor => {
                self.normalization_factor = Some(self.numeric(column, value)?);
            }
            Column::Category => self.category = Some(value.to_text()),
            Column::Simulation => self.simulation = Some(value.to_text()),
            Column::Name => self.name = Some(value.to_text()),
            Column::DataFile => self.data_file = Some(PathBuf::from(value.to_text())),
            Column::Module => self.module = Some(value.to_text()),
            Column::Type => self.series_type = Some(value.to_text()),
            Column::ScalingFactorMultiplier => {
                self.scaling_factor_multiplier = Some(self.numeric(column, value)?);
            }
            Column::ScalingFactorMultiplierModule => {
                self.scaling_factor_multiplier_module = Some(value.to_text())
            }
        }
        Ok(())
    }

    /// Numbers stay numbers, numeric text becomes a number, other text
    /// (e.g. `max`) passes through.
    fn numeric(&self, column: Column, value: Scalar) -> Result<Scalar> {
        let typed = match &value {
            Scalar::Text(s) => Scalar::parse(s),
            other => other.clone(),
        };
        match typed {
            Scalar::Float(f) if !f.is_finite() => Err(self.invalid(column, &value)),
            typed => Ok(typed),
        }
    }

    fn invalid(&self, column: Column, value: &Scalar) -> Error {
        Error::InvalidValue {
            column: column.to_string(),
            entity: self.component_name.clone(),
            value: value.to_text(),
        }
    }

    /// Clears the field for `column`.
    pub fn clear(&mut self, column: Column) {
        match column {
            Column::Resolution => self.resolution = None,
            Column::NormalizationFactor => self.normalization_factor = None,
            Column::Category => self.category = None,
            Column::Simulation => self.simulation = None,
            Column::Name => self.name = None,
            Column::DataFile => self.data_file = None,
            Column::Module => self.module = None,
            Column::Type => self.series_type = None,
            Column::ScalingFactorMultiplier => self.scaling_factor_multiplier = None,
            Column::ScalingFactorMultiplierModule => self.scaling_factor_multiplier_module = None,
        }
    }

    /// Builds the manifest record, with `data_file` relative to `manifest_dir`.
    pub(crate) fn to_entry(&self, manifest_dir: &Path) -> Result<ManifestEntry> {
        let data_file = self.required(Column::DataFile, self.data_file.as_ref())?;
        Ok(ManifestEntry {
            component_name: self.component_name.clone(),
            resolution: *self.required(Column::Resolution, self.resolution.as_ref())?,
            normalization_factor: self
                .required(Column::NormalizationFactor, self.normalization_factor.as_ref())?
                .clone(),
            category: self.required(Column::Category, self.category.as_ref())?.clone(),
            simulation: self
                .required(Column::Simulation, self.simulation.as_ref())?
                .clone(),
            name: self.required(Column::Name, self.name.as_ref())?.clone(),
            data_file: relative_to(data_file, manifest_dir)?,
            module: self.module.clone(),
            series_type: self.series_type.clone(),
            scaling_factor_multiplier: self.scaling_factor_multiplier.clone(),
            scaling_factor_multiplier_module: self.scaling_factor_multiplier_module.clone(),
        })
    }

    fn required<'a, T>(&self, column: Column, value: Option<&'a T>) -> Result<&'a T> {
        value.ok_or_else(|| {
            SchemaError::MissingValue {
                column,
                entity: self.component_name.clone(),
            }
            .into()
        })
    }
}
