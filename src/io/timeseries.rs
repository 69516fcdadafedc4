//! `DateTime`-indexed time-series CSV files.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::info;

use crate::error::{Error, Result};
use crate::source::ProfileMatrix;

/// Header of the leftmost (index) column.
pub const DATETIME_HEADER: &str = "DateTime";

/// Timestamp layout: ISO-8601 with second resolution.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A table of series sharing one time axis.
///
/// Cells are optional because joined series may not cover every timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesFrame {
    index: Vec<NaiveDateTime>,
    columns: Vec<String>,
    rows: Vec<Vec<Option<f64>>>,
}

impl TimeSeriesFrame {
    /// A frame with the given time axis and no columns.
    pub fn new(index: Vec<NaiveDateTime>) -> Self {
        let rows = vec![Vec::new(); index.len()];
        Self {
            index,
            columns: Vec::new(),
            rows,
        }
    }

    /// Wraps a (time × entity) matrix, naming each entity column.
    pub fn from_matrix(
        index: Vec<NaiveDateTime>,
        columns: Vec<String>,
        matrix: &ProfileMatrix,
    ) -> Result<Self> {
        if matrix.n_times() != index.len() {
            return Err(Error::LengthMismatch {
                context: "profile rows vs time index",
                expected: index.len(),
                actual: matrix.n_times(),
            });
        }
        if matrix.n_entities() != columns.len() {
            return Err(Error::LengthMismatch {
                context: "profile columns vs entity names",
                expected: columns.len(),
                actual: matrix.n_entities(),
            });
        }
        let rows = matrix
            .rows()
            .iter()
            .map(|r| r.iter().copied().map(Some).collect())
            .collect();
        Ok(Self {
            index,
            columns,
            rows,
        })
    }

    /// Adds `values` (sampled at `index`) as a new column, aligned on this
    /// frame's time axis.
    ///
    /// Timestamps of this frame missing from `index` get an empty cell;
    /// timestamps only present in `index` are dropped. When `index` repeats a
    /// timestamp the first sample wins.
    pub fn join_column(
        &mut self,
        name: impl Into<String>,
        index: &[NaiveDateTime],
        values: &[f64],
    ) -> Result<()> {
        if index.len() != values.len() {
            return Err(Error::LengthMismatch {
                context: "series values vs series time index",
                expected: index.len(),
                actual: values.len(),
            });
        }
        let mut lookup = HashMap::with_capacity(index.len());
        for (t, v) in index.iter().zip(values) {
            lookup.entry(*t).or_insert(*v);
        }
        for (t, row) in self.index.iter().zip(self.rows.iter_mut()) {
            row.push(lookup.get(t).copied());
        }
        self.columns.push(name.into());
        Ok(())
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.rows
    }
}

/// Writes a frame to a CSV file at the given path, replacing any existing file.
///
/// Missing parent directories are created.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn write_time_series_csv(frame: &TimeSeriesFrame, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let file = File::create(path)?;
    write_time_series(frame, io::BufWriter::new(file))?;
    info!(
        path = %path.display(),
        rows = frame.index.len(),
        columns = frame.columns.len(),
        "wrote time series"
    );
    Ok(())
}

/// Writes a frame as CSV to any writer.
///
/// Missing and `NaN` cells are written empty. Output is deterministic for
/// identical inputs.
pub fn write_time_series(frame: &TimeSeriesFrame, writer: impl Write) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    let header = std::iter::once(DATETIME_HEADER).chain(frame.columns.iter().map(String::as_str));
    wtr.write_record(header)?;

    let mut record = Vec::with_capacity(frame.columns.len() + 1);
    for (t, row) in frame.index.iter().zip(&frame.rows) {
        record.clear();
        record.push(t.format(DATETIME_FORMAT).to_string());
        record.extend(row.iter().map(|cell| match cell {
            Some(v) if !v.is_nan() => v.to_string(),
            _ => String::new(),
        }));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .and_then(|d| d.and_hms_opt(h, 0, 0))
            .unwrap_or_default()
    }

    fn render(frame: &TimeSeriesFrame) -> String {
        let mut buf = Vec::new();
        write_time_series(frame, &mut buf).ok();
        String::from_utf8(buf).unwrap_or_default()
    }

    #[test]
    fn header_starts_with_datetime() {
        let matrix = ProfileMatrix::from_rows(2, vec![vec![1.0, 2.0]]).ok();
        let frame = matrix.and_then(|m| {
            TimeSeriesFrame::from_matrix(vec![at(0)], vec!["a".into(), "b".into()], &m).ok()
        });
        let out = frame.as_ref().map(render).unwrap_or_default();
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("DateTime,a,b"));
        assert_eq!(lines.next(), Some("2020-01-01T00:00:00,1,2"));
    }

    #[test]
    fn join_aligns_on_frame_axis() {
        let mut frame = TimeSeriesFrame::new(vec![at(0), at(1), at(2)]);
        frame
            .join_column("0", &[at(0), at(1), at(2)], &[0.1, 0.2, 0.3])
            .ok();
        // second horizon is shifted by one hour and misses the first step
        frame
            .join_column("1", &[at(1), at(2), at(3)], &[1.1, 1.2, 1.3])
            .ok();

        assert_eq!(frame.columns(), ["0", "1"]);
        assert_eq!(frame.rows()[0], vec![Some(0.1), None]);
        assert_eq!(frame.rows()[2], vec![Some(0.3), Some(1.2)]);

        let out = render(&frame);
        let lines: Vec<&str> = out.lines().collect();
        // 1 header + 3 data rows; at(3) is dropped
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "2020-01-01T00:00:00,0.1,");
    }

    #[test]
    fn join_rejects_length_mismatch() {
        let mut frame = TimeSeriesFrame::new(vec![at(0)]);
        let result = frame.join_column("0", &[at(0)], &[]);
        assert!(matches!(result, Err(Error::LengthMismatch { .. })));
        assert!(frame.columns().is_empty());
    }

    #[test]
    fn nan_written_as_empty() {
        let mut frame = TimeSeriesFrame::new(vec![at(0)]);
        frame.join_column("x", &[at(0)], &[f64::NAN]).ok();
        assert_eq!(render(&frame).lines().nth(1), Some("2020-01-01T00:00:00,"));
    }

    #[test]
    fn deterministic_output() {
        let mut frame = TimeSeriesFrame::new(vec![at(0), at(1)]);
        frame.join_column("p", &[at(0), at(1)], &[3.5, 4.25]).ok();
        assert_eq!(render(&frame), render(&frame));
    }

    #[test]
    fn round_trip_parseable() {
        let mut frame = TimeSeriesFrame::new(vec![at(0), at(1), at(2)]);
        frame.join_column("p", &[at(0), at(1), at(2)], &[1.0, 2.0, 3.0]).ok();
        let out = render(&frame);

        let mut rdr = csv::ReaderBuilder::new().from_reader(out.as_bytes());
        let headers = rdr.headers().cloned().ok();
        assert_eq!(headers.as_ref().map(csv::StringRecord::len), Some(2));

        let mut row_count = 0;
        for record in rdr.records() {
            let rec = record.ok();
            assert!(rec.is_some(), "every row should parse");
            let stamp = rec.as_ref().and_then(|r| r.get(0)).unwrap_or("");
            assert!(NaiveDateTime::parse_from_str(stamp, DATETIME_FORMAT).is_ok());
            row_count += 1;
        }
        assert_eq!(row_count, 3);
    }
}
