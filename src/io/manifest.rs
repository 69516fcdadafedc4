//! JSON manifest: one object per entity describing its series.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::source::Scalar;

/// One manifest record. Required keys are plain fields, optional keys are
/// omitted from the JSON when `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub component_name: String,
    /// Seconds between samples.
    pub resolution: f64,
    pub normalization_factor: Scalar,
    pub category: String,
    pub simulation: String,
    pub name: String,
    /// Path relative to the manifest's directory.
    pub data_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub series_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling_factor_multiplier: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling_factor_multiplier_module: Option<String>,
}

/// Writes `entries` as a JSON array, replacing any existing file.
///
/// Missing parent directories are created.
pub fn write_manifest(entries: &[ManifestEntry], path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, entries)?;
    writer.flush()?;
    info!(path = %path.display(), entries = entries.len(), "wrote manifest");
    Ok(())
}

/// Parses a manifest written by [`write_manifest`].
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
