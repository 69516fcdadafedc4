//! Nearest-neighbor matching between two point sets with a fan-out bound.
//!
//! Every source point is assigned the index of its nearest target point.
//! The set of sources sharing one target is that target's *fiber*; if the
//! largest fiber exceeds [`MatchOptions::max_fan_out`] the input is most
//! likely wrong (too few targets, or coordinates in the wrong columns), so
//! the default policy is to fail.

mod kdtree;

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, PointSide, Result};
use crate::source::{MetaTable, Scalar};

pub use kdtree::KdTree;

/// A (latitude, longitude) pair. Distances are planar Euclidean on these
/// two numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    fn coord(self, axis: usize) -> f64 {
        if axis == 0 {
            self.latitude
        } else {
            self.longitude
        }
    }

    fn distance_squared(self, other: Point) -> f64 {
        let dlat = self.latitude - other.latitude;
        let dlon = self.longitude - other.longitude;
        dlat * dlat + dlon * dlon
    }

    fn is_finite(self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Response to a fan-out violation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanOutPolicy {
    /// Return [`Error::FanOut`].
    #[default]
    Fail,
    /// Log a warning and return the matching anyway.
    Warn,
}

/// Matcher parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOptions {
    /// Largest allowed fiber.
    pub max_fan_out: usize,
    pub on_violation: FanOutPolicy,
    pub latitude_column: String,
    pub longitude_column: String,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_fan_out: 5,
            on_violation: FanOutPolicy::Fail,
            latitude_column: "latitude".to_string(),
            longitude_column: "longitude".to_string(),
        }
    }
}

/// Result of a matching run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matching {
    assignments: Vec<usize>,
    max_fiber: usize,
}

impl Matching {
    /// Target index for each source point, in source order.
    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    pub fn into_assignments(self) -> Vec<usize> {
        self.assignments
    }

    /// Size of the largest fiber; 0 when there are no source points.
    pub fn max_fiber(&self) -> usize {
        self.max_fiber
    }

    /// Source indices grouped by assigned target.
    pub fn fibers(&self) -> BTreeMap<usize, Vec<usize>> {
        let mut fibers: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (source, &target) in self.assignments.iter().enumerate() {
            fibers.entry(target).or_default().push(source);
        }
        fibers
    }
}

/// Reads the coordinate columns of `table` as points.
///
/// # Errors
///
/// `MissingCoordinates` if either column is absent, `InvalidCoordinate` if a
/// cell is not a finite number.
pub fn extract_points(
    table: &MetaTable,
    side: PointSide,
    options: &MatchOptions,
) -> Result<Vec<Point>> {
    let lat = coordinate_column(table, side, &options.latitude_column)?;
    let lon = coordinate_column(table, side, &options.longitude_column)?;
    lat.into_iter()
        .zip(lon)
        .enumerate()
        .map(|(row, (lat, lon))| {
            let number = |cell: &Scalar, column: &str| {
                cell.as_f64()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| Error::InvalidCoordinate {
                        side,
                        row,
                        column: column.to_string(),
                    })
            };
            Ok(Point::new(
                number(lat, &options.latitude_column)?,
                number(lon, &options.longitude_column)?,
            ))
        })
        .collect()
}

fn coordinate_column<'t>(
    table: &'t MetaTable,
    side: PointSide,
    column: &str,
) -> Result<Vec<&'t Scalar>> {
    table
        .column(column)
        .ok_or_else(|| Error::MissingCoordinates {
            side,
            column: column.to_string(),
        })
}

/// Matches the rows of `source` to the rows of `target` by coordinates.
///
/// Both tables are checked for the coordinate columns before any matching
/// work is done.
pub fn match_tables(
    source: &MetaTable,
    target: &MetaTable,
    options: &MatchOptions,
) -> Result<Matching> {
    for (table, side) in [(source, PointSide::Source), (target, PointSide::Target)] {
        coordinate_column(table, side, &options.latitude_column)?;
        coordinate_column(table, side, &options.longitude_column)?;
    }
    let source_points = extract_points(source, PointSide::Source, options)?;
    let target_points = extract_points(target, PointSide::Target, options)?;
    match_points(&source_points, &target_points, options)
}

/// Assigns every source point its nearest target and enforces the fan-out
/// bound.
///
/// Equidistant targets resolve to the lowest target index.
///
/// # Errors
///
/// `EmptyTarget` when there are sources but no targets, `InvalidCoordinate`
/// for non-finite coordinates, and `FanOut` when the largest fiber exceeds
/// `max_fan_out` under [`FanOutPolicy::Fail`].
pub fn match_points(
    source: &[Point],
    target: &[Point],
    options: &MatchOptions,
) -> Result<Matching> {
    check_finite(source, PointSide::Source)?;
    check_finite(target, PointSide::Target)?;
    if source.is_empty() {
        return Ok(Matching {
            assignments: Vec::new(),
            max_fiber: 0,
        });
    }
    if target.is_empty() {
        return Err(Error::EmptyTarget);
    }

    let tree = KdTree::build(target);
    let assignments = source
        .iter()
        .map(|&p| tree.nearest(p).ok_or(Error::EmptyTarget))
        .collect::<Result<Vec<_>>>()?;

    let mut counts = vec![0usize; target.len()];
    for &t in &assignments {
        counts[t] += 1;
    }
    // first maximum, so the reported target is the lowest index among ties
    let (crowded, max_fiber) = counts
        .iter()
        .copied()
        .enumerate()
        .fold((0, 0), |best, (t, n)| if n > best.1 { (t, n) } else { best });

    debug!(
        sources = source.len(),
        targets = target.len(),
        max_fiber,
        "matched points"
    );

    if max_fiber > options.max_fan_out {
        match options.on_violation {
            FanOutPolicy::Fail => {
                return Err(Error::FanOut {
                    observed: max_fiber,
                    bound: options.max_fan_out,
                    target: crowded,
                });
            }
            FanOutPolicy::Warn => warn!(
                target_index = crowded,
                observed = max_fiber,
                bound = options.max_fan_out,
                "fan-out bound exceeded"
            ),
        }
    }

    Ok(Matching {
        assignments,
        max_fiber,
    })
}

fn check_finite(points: &[Point], side: PointSide) -> Result<()> {
    match points.iter().position(|p| !p.is_finite()) {
        Some(row) => Err(Error::InvalidCoordinate {
            side,
            row,
            column: "latitude/longitude".to_string(),
        }),
        None => Ok(()),
    }
}
