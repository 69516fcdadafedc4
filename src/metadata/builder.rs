//! Accumulates the entity table and exports it as a manifest.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, TimeDelta};
use tracing::{debug, info};

use super::Column;
use super::record::EntityRecord;
use crate::config::MetadataConfig;
use crate::error::{Error, Result, SchemaError};
use crate::io::paths::parent_dir;
use crate::io::timeseries::{TimeSeriesFrame, write_time_series_csv};
use crate::io::{ManifestEntry, write_manifest};
use crate::source::{MetaTable, ProfileMatrix, ProfileSource, Scalar};

/// Default `module` for multi-horizon series.
pub const DETERMINISTIC_MODULE: &str = "InfrastructureSystems";
/// Default `type` for multi-horizon series.
pub const DETERMINISTIC_TYPE: &str = "Deterministic";

/// Value for [`TimeSeriesMetadata::set`]: one value for every row, or one
/// value per row in table order.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Scalar(Scalar),
    Sequence(Vec<Scalar>),
}

impl From<Scalar> for ColumnValue {
    fn from(v: Scalar) -> Self {
        ColumnValue::Scalar(v)
    }
}

impl From<Vec<Scalar>> for ColumnValue {
    fn from(v: Vec<Scalar>) -> Self {
        ColumnValue::Sequence(v)
    }
}

/// Metadata table for one export run.
///
/// Rows are keyed by a unique entity identifier. A column is either part of
/// the table or not; once present, [`fill_if_absent`](Self::fill_if_absent)
/// leaves it alone while [`set`](Self::set) always overwrites it.
#[derive(Debug, Clone)]
pub struct TimeSeriesMetadata {
    id_column: String,
    columns: BTreeSet<Column>,
    records: Vec<EntityRecord>,
}

impl Default for TimeSeriesMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSeriesMetadata {
    /// An empty table keyed by `component_name`.
    pub fn new() -> Self {
        Self {
            id_column: MetadataConfig::default().id_column,
            columns: BTreeSet::new(),
            records: Vec::new(),
        }
    }

    /// Builds a table with one row per metadata row and applies the default
    /// fills for `normalization_factor`, `category`, `simulation` and `name`.
    /// `scaling_factor_multiplier` is copied when the source has it, else
    /// filled only if a default is configured.
    ///
    /// # Errors
    ///
    /// Fails if the identifier column is missing or repeats an identifier.
    pub fn from_meta(meta: &MetaTable, config: &MetadataConfig) -> Result<Self> {
        let mut table = Self {
            id_column: config.id_column.clone(),
            ..Self::new()
        };
        for id in meta.identifiers(&config.id_column)? {
            table.add_entity(id)?;
        }

        table
            .fill_if_absent(
                Column::NormalizationFactor,
                meta,
                config.normalization_factor.clone(),
            )?
            .fill_if_absent(Column::Category, meta, config.category.as_str())?
            .fill_if_absent(Column::Simulation, meta, config.simulation.as_str())?
            .fill_if_absent(Column::Name, meta, config.name.as_str())?;
        let multiplier = Column::ScalingFactorMultiplier;
        match &config.scaling_factor_multiplier {
            Some(default) => {
                table.fill_if_absent(multiplier, meta, default.clone())?;
            }
            // no default: carried only when the source has it
            None if meta.has_column(multiplier.as_str()) => {
                table.fill_if_absent(multiplier, meta, Scalar::Text(String::new()))?;
            }
            None => {}
        }
        debug!(entities = table.len(), "initialized metadata from source");
        Ok(table)
    }

    /// Builds from a simulation output and sets `resolution`.
    ///
    /// The resolution is `resolution` when given, else the metadata's own
    /// `resolution` column, else the gap between the first two timestamps.
    pub fn from_source<S>(
        source: &S,
        resolution: Option<TimeDelta>,
        config: &MetadataConfig,
    ) -> Result<Self>
    where
        S: ProfileSource + ?Sized,
    {
        let meta = source.meta();
        let mut table = Self::from_meta(meta, config)?;
        match resolution {
            Some(delta) => {
                table.set(Column::Resolution, Scalar::Float(delta_seconds(delta)))?;
            }
            None if meta.has_column(Column::Resolution.as_str()) => {
                table.fill_if_absent(Column::Resolution, meta, Scalar::Integer(0))?;
            }
            None => {
                let delta = match source.time_index() {
                    [first, second, ..] => *second - *first,
                    _ => return Err(Error::UnknownResolution),
                };
                table.set(Column::Resolution, Scalar::Float(delta_seconds(delta)))?;
            }
        }
        Ok(table)
    }

    /// Appends an entity with no column values.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIdentifier` if the identifier is already present.
    pub fn add_entity(&mut self, id: impl Into<String>) -> Result<&mut Self> {
        let id = id.into();
        if self.records.iter().any(|r| r.component_name == id) {
            return Err(Error::DuplicateIdentifier(id));
        }
        self.records.push(EntityRecord::new(id));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Metadata column used to align rows with a source.
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    /// Entity identifiers in table order.
    pub fn identifiers(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.component_name.clone())
            .collect()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().copied()
    }

    /// Adds `column` unless it already exists: copied from `source` when the
    /// source has it (rows matched by identifier), otherwise `default` for
    /// every row.
    ///
    /// # Errors
    ///
    /// Fails if `source` has the column but lacks the identifier column or
    /// one of this table's entities.
    pub fn fill_if_absent(
        &mut self,
        column: Column,
        source: &MetaTable,
        default: impl Into<Scalar>,
    ) -> Result<&mut Self> {
        if self.has_column(column) {
            return Ok(self);
        }
        let Some(cells) = source.column(column.as_str()) else {
            let default: Scalar = default.into();
            return self.set(column, default);
        };

        let ids = source.identifiers(&self.id_column)?;
        let mut by_id = HashMap::with_capacity(ids.len());
        for (id, cell) in ids.into_iter().zip(cells) {
            by_id.entry(id).or_insert(cell);
        }
        let values = self
            .records
            .iter()
            .map(|r| {
                by_id
                    .get(&r.component_name)
                    .map(|cell| (*cell).clone())
                    .ok_or_else(|| Error::UnknownEntity(r.component_name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        self.set(column, values)
    }

    /// Assigns `value` to `column` for every row, replacing prior content.
    ///
    /// # Errors
    ///
    /// Fails if a sequence does not have one value per row, or if a value
    /// does not fit the column's type. On error the table is unchanged.
    pub fn set(&mut self, column: Column, value: impl Into<ColumnValue>) -> Result<&mut Self> {
        let values = match value.into() {
            ColumnValue::Scalar(v) => vec![v; self.records.len()],
            ColumnValue::Sequence(vs) => {
                if vs.len() != self.records.len() {
                    return Err(Error::LengthMismatch {
                        context: "column values vs table rows",
                        expected: self.records.len(),
                        actual: vs.len(),
                    });
                }
                vs
            }
        };

        let mut updated = self.records.clone();
        for (record, value) in updated.iter_mut().zip(values) {
            record.assign(column, value)?;
        }
        self.records = updated;
        self.columns.insert(column);
        Ok(self)
    }

    /// Drops `column` and its values from every row.
    pub fn remove(&mut self, column: Column) -> &mut Self {
        if self.columns.remove(&column) {
            for record in &mut self.records {
                record.clear(column);
            }
        }
        self
    }

    /// Sets a column outside the manifest taxonomy. Such columns are kept on
    /// the table but dropped at export.
    pub fn set_extra(&mut self, name: &str, value: Scalar) -> &mut Self {
        for record in &mut self.records {
            record.extra.insert(name.to_string(), value.clone());
        }
        self
    }

    /// Writes one CSV per entity holding that entity's series from every
    /// horizon, and points `data_file` at those files.
    ///
    /// Columns of each CSV are the horizon positions `0..k`; rows follow the
    /// first horizon's time axis. `template` must contain one `{}` slot,
    /// replaced with the entity identifier. `module` and `type` are filled
    /// with the deterministic-series defaults when absent. An empty `horizons`
    /// slice leaves the table untouched.
    pub fn attach_lookaheads<S: ProfileSource>(
        &mut self,
        horizons: &[S],
        template: &str,
    ) -> Result<&mut Self> {
        let Some(first) = horizons.first() else {
            debug!("no horizons given, skipping lookahead attachment");
            return Ok(self);
        };
        let template = FileTemplate::parse(template)?;
        let time_axis = first.time_index().to_vec();

        let mut data_files = Vec::with_capacity(self.records.len());
        for record in &self.records {
            let id = &record.component_name;
            let mut frame = TimeSeriesFrame::new(time_axis.clone());
            for (h, horizon) in horizons.iter().enumerate() {
                let entity = horizon
                    .meta()
                    .position_of(&self.id_column, id)
                    .ok_or_else(|| Error::UnknownEntity(id.clone()))?;
                let series = horizon.profile(entity)?;
                frame.join_column(h.to_string(), horizon.time_index(), &series)?;
            }
            let path = template.render(id);
            write_time_series_csv(&frame, &path)?;
            debug!(
                entity = %id,
                path = %path.display(),
                horizons = horizons.len(),
                "attached lookaheads"
            );
            data_files.push(Scalar::Text(path.to_string_lossy().into_owned()));
        }

        self.set(Column::DataFile, data_files)?
            .fill_if_absent(Column::Module, &MetaTable::default(), DETERMINISTIC_MODULE)?
            .fill_if_absent(Column::Type, &MetaTable::default(), DETERMINISTIC_TYPE)
    }

    /// Writes every entity's series into one CSV at `path`, one column per
    /// identifier in table order, and points every row's `data_file` at it.
    ///
    /// `profiles` is indexed (time, entity) with entities in table order.
    pub fn attach_profiles(
        &mut self,
        profiles: &ProfileMatrix,
        time_index: &[NaiveDateTime],
        path: &Path,
    ) -> Result<&mut Self> {
        let frame =
            TimeSeriesFrame::from_matrix(time_index.to_vec(), self.identifiers(), profiles)?;
        write_time_series_csv(&frame, path)?;
        self.set(
            Column::DataFile,
            Scalar::Text(path.to_string_lossy().into_owned()),
        )
    }

    /// Checks the table against the manifest schema.
    ///
    /// Every required column must be present with a value for every row,
    /// and `module` and `type` must be present together or not at all.
    ///
    /// # Errors
    ///
    /// Returns the first violation found; required columns are checked in
    /// [`Column::REQUIRED`] order.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for column in Column::REQUIRED {
            self.check_filled(column)?;
        }

        let module = self.has_column(Column::Module);
        let series_type = self.has_column(Column::Type);
        if module != series_type {
            return Err(SchemaError::UnpairedSeriesKind {
                module,
                series_type,
            });
        }
        if module {
            self.check_filled(Column::Module)?;
            self.check_filled(Column::Type)?;
        }
        Ok(())
    }

    fn check_filled(&self, column: Column) -> Result<(), SchemaError> {
        if !self.has_column(column) {
            return Err(SchemaError::MissingColumn(column));
        }
        if let Some(r) = self.records.iter().find(|r| !r.has(column)) {
            return Err(SchemaError::MissingValue {
                column,
                entity: r.component_name.clone(),
            });
        }
        Ok(())
    }

    /// Validates and renders the manifest records, with `data_file` paths
    /// relative to `manifest_dir`. Columns outside the taxonomy are dropped.
    pub fn to_manifest(&self, manifest_dir: &Path) -> Result<Vec<ManifestEntry>> {
        self.validate()?;
        self.records
            .iter()
            .map(|r| r.to_entry(manifest_dir))
            .collect()
    }

    /// Validates the table and writes the manifest to `path`.
    ///
    /// The CSV files referenced by `data_file` are not written here.
    pub fn export_json(&self, path: &Path) -> Result<()> {
        let entries = self.to_manifest(parent_dir(path))?;
        write_manifest(&entries, path)?;
        info!(path = %path.display(), entities = entries.len(), "exported metadata");
        Ok(())
    }
}

/// How [`concat`] combines the column sets of its inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColumnJoin {
    /// Keep every column of any input; rows from inputs lacking one get no value.
    #[default]
    Outer,
    /// Keep only columns present in every input.
    Inner,
}

/// Options for [`concat`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConcatOptions {
    pub join: ColumnJoin,
    /// Accept identifiers that appear in more than one input.
    pub allow_duplicate_ids: bool,
}

/// Stacks the rows of several tables into one, in input order.
///
/// All inputs must share one identifier column, which the result keeps.
///
/// # Errors
///
/// Returns `IdColumnMismatch` when an input is keyed by a different
/// identifier column, and `DuplicateIdentifier` when an identifier repeats
/// and `allow_duplicate_ids` is off.
pub fn concat(
    parts: impl IntoIterator<Item = TimeSeriesMetadata>,
    options: ConcatOptions,
) -> Result<TimeSeriesMetadata> {
    let mut parts = parts.into_iter();
    let Some(mut merged) = parts.next() else {
        return Ok(TimeSeriesMetadata::new());
    };

    for part in parts {
        if part.id_column != merged.id_column {
            return Err(Error::IdColumnMismatch {
                expected: merged.id_column,
                found: part.id_column,
            });
        }
        merged.columns = match options.join {
            ColumnJoin::Outer => merged.columns.union(&part.columns).copied().collect(),
            ColumnJoin::Inner => merged.columns.intersection(&part.columns).copied().collect(),
        };
        merged.records.extend(part.records);
    }

    if options.join == ColumnJoin::Inner {
        for record in &mut merged.records {
            for column in Column::REQUIRED.into_iter().chain(Column::OPTIONAL) {
                if !merged.columns.contains(&column) {
                    record.clear(column);
                }
            }
        }
    }

    if !options.allow_duplicate_ids {
        let mut seen = HashSet::with_capacity(merged.records.len());
        if let Some(dup) = merged
            .records
            .iter()
            .find(|r| !seen.insert(r.component_name.as_str()))
        {
            return Err(Error::DuplicateIdentifier(dup.component_name.clone()));
        }
    }

    debug!(entities = merged.len(), "concatenated metadata");
    Ok(merged)
}

/// Output path pattern with a single `{}` slot for the entity identifier.
#[derive(Debug, Clone)]
struct FileTemplate {
    pattern: String,
}

impl FileTemplate {
    fn parse(pattern: &str) -> Result<Self> {
        if pattern.matches("{}").count() != 1 {
            return Err(Error::InvalidTemplate(pattern.to_string()));
        }
        Ok(Self {
            pattern: pattern.to_string(),
        })
    }

    fn render(&self, id: &str) -> PathBuf {
        PathBuf::from(self.pattern.replacen("{}", id, 1))
    }
}

fn delta_seconds(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 1000.0
}
