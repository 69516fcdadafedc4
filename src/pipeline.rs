//! One-shot export pipelines.
//!
//! These tie a [`ProfileSource`] to the metadata builder and the writers:
//! build the table, write the series CSV files, then write the manifest.

use std::path::Path;

use tracing::{debug, info};

use crate::config::ExportConfig;
use crate::error::{Error, Result, SchemaError};
use crate::metadata::{Column, TimeSeriesMetadata};
use crate::source::{MetaTable, ProfileSource};

/// Checks that source metadata can be exported as a single multi-entity
/// series.
///
/// # Errors
///
/// Returns `MissingIdentifier` when `id_column` is absent, and
/// `UnpairedSeriesKind` when only one of `module` and `type` is present.
pub fn validate_source_columns(meta: &MetaTable, id_column: &str) -> Result<()> {
    if !meta.has_column(id_column) {
        return Err(Error::MissingIdentifier(id_column.to_string()));
    }
    let module = meta.has_column(Column::Module.as_str());
    let series_type = meta.has_column(Column::Type.as_str());
    if module != series_type {
        return Err(SchemaError::UnpairedSeriesKind {
            module,
            series_type,
        }
        .into());
    }
    Ok(())
}

/// Exports every entity of `source` into one CSV at `csv_path` and writes
/// the manifest to `manifest_path`.
///
/// `module` and `type` are carried over from the source metadata when it
/// has them.
///
/// # Errors
///
/// Fails on invalid source columns, unresolvable resolution, schema
/// violations, or I/O errors.
pub fn export_profiles<S>(
    source: &S,
    csv_path: &Path,
    manifest_path: &Path,
    config: &ExportConfig,
) -> Result<TimeSeriesMetadata>
where
    S: ProfileSource + ?Sized,
{
    let meta = source.meta();
    validate_source_columns(meta, &config.metadata.id_column)?;

    let mut table =
        TimeSeriesMetadata::from_source(source, config.metadata.resolution()?, &config.metadata)?;
    if meta.has_column(Column::Module.as_str()) {
        table
            .fill_if_absent(Column::Module, meta, "")?
            .fill_if_absent(Column::Type, meta, "")?;
    }

    let profiles = source.profiles()?;
    table.attach_profiles(&profiles, source.time_index(), csv_path)?;
    table.export_json(manifest_path)?;
    info!(
        entities = table.len(),
        csv = %csv_path.display(),
        manifest = %manifest_path.display(),
        "exported profiles"
    );
    Ok(table)
}

/// Exports one CSV per entity holding its series from every horizon, then
/// writes the manifest.
///
/// Metadata comes from the first horizon. The resolution is the configured
/// one, else `lookahead.default_resolution_seconds`. An empty `horizons`
/// slice writes nothing and returns `Ok(None)`.
///
/// # Errors
///
/// Fails on an invalid template, an entity missing from a later horizon,
/// schema violations, or I/O errors.
pub fn export_lookaheads<S: ProfileSource>(
    horizons: &[S],
    csv_template: &str,
    manifest_path: &Path,
    config: &ExportConfig,
) -> Result<Option<TimeSeriesMetadata>> {
    let Some(first) = horizons.first() else {
        debug!("no horizons given, nothing to export");
        return Ok(None);
    };

    let mut table = TimeSeriesMetadata::from_source(
        first,
        Some(config.lookahead_resolution()?),
        &config.metadata,
    )?;
    table.attach_lookaheads(horizons, csv_template)?;
    table.export_json(manifest_path)?;
    info!(
        entities = table.len(),
        horizons = horizons.len(),
        manifest = %manifest_path.display(),
        "exported lookaheads"
    );
    Ok(Some(table))
}
