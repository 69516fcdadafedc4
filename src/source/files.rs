//! CSV-backed [`ProfileSource`].

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use tracing::debug;

use super::{MetaTable, ProfileMatrix, ProfileSource, Scalar};
use crate::error::{Error, Result};

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Simulation output held in memory, loaded from a metadata CSV and a
/// profile CSV.
///
/// The profile CSV's leftmost column holds timestamps; every other column is
/// one entity, in the same order as the metadata rows.
#[derive(Debug, Clone)]
pub struct CsvSource {
    meta: MetaTable,
    time_index: Vec<NaiveDateTime>,
    profiles: ProfileMatrix,
}

impl CsvSource {
    /// Assembles a source from parts already in memory.
    ///
    /// # Errors
    ///
    /// Returns `LengthMismatch` if the matrix does not have one row per
    /// timestamp and one column per metadata row.
    pub fn new(
        meta: MetaTable,
        time_index: Vec<NaiveDateTime>,
        profiles: ProfileMatrix,
    ) -> Result<Self> {
        if profiles.n_times() != time_index.len() {
            return Err(Error::LengthMismatch {
                context: "profile rows vs time index",
                expected: time_index.len(),
                actual: profiles.n_times(),
            });
        }
        if profiles.n_entities() != meta.len() {
            return Err(Error::LengthMismatch {
                context: "profile columns vs metadata rows",
                expected: meta.len(),
                actual: profiles.n_entities(),
            });
        }
        Ok(Self {
            meta,
            time_index,
            profiles,
        })
    }

    /// Loads metadata and profiles from two CSV files.
    pub fn from_files(meta_path: &Path, profile_path: &Path) -> Result<Self> {
        let meta = read_meta(File::open(meta_path)?)?;
        let (time_index, profiles) = read_profiles(File::open(profile_path)?)?;
        debug!(
            meta = %meta_path.display(),
            profiles = %profile_path.display(),
            entities = meta.len(),
            timestamps = time_index.len(),
            "loaded csv source"
        );
        Self::new(meta, time_index, profiles)
    }

    /// Replaces the metadata, keeping the time axis and profiles.
    ///
    /// Used when several horizon files share one metadata table.
    pub fn with_meta(self, meta: MetaTable) -> Result<Self> {
        Self::new(meta, self.time_index, self.profiles)
    }
}

impl ProfileSource for CsvSource {
    fn meta(&self) -> &MetaTable {
        &self.meta
    }

    fn time_index(&self) -> &[NaiveDateTime] {
        &self.time_index
    }

    fn profiles(&self) -> Result<ProfileMatrix> {
        Ok(self.profiles.clone())
    }

    fn profile(&self, entity: usize) -> Result<Vec<f64>> {
        self.profiles.column(entity)
    }
}

/// Reads a metadata table. Cells are kept as [`Scalar::Text`] exactly as
/// written, so identifiers such as `007` survive; numeric reads go through
/// [`Scalar::as_f64`].
pub fn read_meta(reader: impl Read) -> Result<MetaTable> {
    let mut rdr = csv::ReaderBuilder::new().from_reader(reader);
    let mut table = MetaTable::new(rdr.headers()?.iter());
    for record in rdr.records() {
        let record = record?;
        table.push_row(record.iter().map(Scalar::from).collect())?;
    }
    Ok(table)
}

/// Reads a `DateTime`-indexed profile CSV. Empty cells become `NaN`.
pub fn read_profiles(reader: impl Read) -> Result<(Vec<NaiveDateTime>, ProfileMatrix)> {
    let mut rdr = csv::ReaderBuilder::new().from_reader(reader);
    let headers = rdr.headers()?.clone();
    let n_entities = headers.len().saturating_sub(1);

    let mut time_index = Vec::new();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let stamp = record
            .get(0)
            .ok_or_else(|| Error::InvalidTimestamp(String::new()))?;
        time_index.push(parse_timestamp(stamp)?);

        let mut row = Vec::with_capacity(n_entities);
        for (col, cell) in record.iter().enumerate().skip(1) {
            let cell = cell.trim();
            let value = if cell.is_empty() {
                f64::NAN
            } else {
                cell.parse::<f64>().map_err(|_| Error::InvalidValue {
                    column: headers.get(col).unwrap_or_default().to_string(),
                    entity: stamp.to_string(),
                    value: cell.to_string(),
                })?
            };
            row.push(value);
        }
        rows.push(row);
    }

    Ok((time_index, ProfileMatrix::from_rows(n_entities, rows)?))
}

/// Parses an ISO-8601 timestamp, with or without an offset.
///
/// Timestamps carrying an offset are converted to UTC.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| Error::InvalidTimestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const META: &str = "\
component_name,latitude,longitude,category
wind_1,39.7,-105.2,Wind
wind_2,40.1,-104.9,Wind
";

    const PROFILES: &str = "\
DateTime,wind_1,wind_2
2007-01-01T00:00:00,0.5,0.25
2007-01-01T01:00:00,,0.75
";

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2007, 1, 1)
            .and_then(|d| d.and_hms_opt(h, 0, 0))
            .unwrap_or_default()
    }

    #[test]
    fn parses_timestamp_variants() {
        assert_eq!(parse_timestamp("2007-01-01T01:00:00").ok(), Some(at(1)));
        assert_eq!(parse_timestamp("2007-01-01 01:00:00").ok(), Some(at(1)));
        assert_eq!(parse_timestamp("2007-01-01T03:00:00+02:00").ok(), Some(at(1)));
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(Error::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn reads_meta_cells() {
        let meta = read_meta(META.as_bytes());
        assert!(meta.is_ok(), "{:?}", meta.err());
        let meta = meta.ok().unwrap_or_default();
        assert_eq!(meta.len(), 2);
        assert_eq!(meta.get(0, "latitude").and_then(Scalar::as_f64), Some(39.7));
        assert_eq!(meta.get(1, "category"), Some(&Scalar::Text("Wind".into())));
    }

    #[test]
    fn meta_cells_keep_their_text() {
        let csv = "component_name,category\n007,01\n1.50,1e3\n";
        let meta = read_meta(csv.as_bytes()).unwrap_or_default();
        assert_eq!(
            meta.identifiers("component_name").ok(),
            Some(vec!["007".to_string(), "1.50".to_string()])
        );
        assert_eq!(meta.get(1, "category").map(Scalar::to_text).as_deref(), Some("1e3"));
        assert_eq!(meta.position_of("component_name", "1.50"), Some(1));
        assert_eq!(meta.position_of("component_name", "1.5"), None);
    }

    #[test]
    fn reads_profiles_with_gaps() {
        let (index, matrix) =
            read_profiles(PROFILES.as_bytes()).expect("profiles should parse");
        assert_eq!(index, vec![at(0), at(1)]);
        assert_eq!(matrix.n_entities(), 2);
        let first = matrix.column(0).unwrap_or_default();
        assert_eq!(first[0], 0.5);
        assert!(first[1].is_nan());
    }

    #[test]
    fn rejects_non_numeric_profile_cell() {
        let bad = "DateTime,a\n2007-01-01T00:00:00,high\n";
        assert!(matches!(
            read_profiles(bad.as_bytes()),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn source_checks_entity_count() {
        let meta = read_meta(META.as_bytes()).unwrap_or_default();
        let matrix = ProfileMatrix::from_rows(1, vec![vec![0.0]]);
        let result = matrix.and_then(|m| CsvSource::new(meta, vec![at(0)], m));
        assert!(matches!(
            result,
            Err(Error::LengthMismatch { expected: 2, actual: 1, .. })
        ));
    }
}
