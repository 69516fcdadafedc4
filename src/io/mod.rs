//! File formats of the exchange bundle: time-series CSVs and the JSON manifest.

pub mod manifest;
pub mod paths;
pub mod timeseries;

pub use manifest::{ManifestEntry, read_manifest, write_manifest};
pub use timeseries::{TimeSeriesFrame, write_time_series, write_time_series_csv};
