//! Export of simulated generation profiles into the time-series exchange
//! format of a power-systems modeling toolkit, plus nearest-neighbor
//! matching of two geographic point sets.
//!
//! The usual flow is [`source::CsvSource`] → [`metadata::TimeSeriesMetadata`]
//! → CSV series files and a JSON manifest, wrapped by the functions in
//! [`pipeline`].

pub mod config;
pub mod error;
/// CSV and manifest writers plus path helpers.
pub mod io;
pub mod matching;
pub mod metadata;
pub mod pipeline;
pub mod source;

pub use error::{Error, Result};
