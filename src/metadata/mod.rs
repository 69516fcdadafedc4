//! Metadata table for the exchange manifest.
//!
//! A [`TimeSeriesMetadata`] is created from simulation output metadata,
//! gains `data_file` references as series CSVs are written, and is exported
//! once [`TimeSeriesMetadata::validate`] passes.

mod builder;
mod column;
mod record;

pub use builder::{
    ColumnJoin, ColumnValue, ConcatOptions, DETERMINISTIC_MODULE, DETERMINISTIC_TYPE,
    TimeSeriesMetadata, concat,
};
pub use column::Column;
pub use record::EntityRecord;
