//! Property and scenario tests for nearest-neighbor matching.

mod common;

use std::fs::File;

use common::{META, Workspace};
use proptest::prelude::*;
use rev_powersystems::Error;
use rev_powersystems::error::PointSide;
use rev_powersystems::config::ExportConfig;
use rev_powersystems::matching::{FanOutPolicy, MatchOptions, Point, match_points, match_tables};
use rev_powersystems::source::read_meta;

fn dist2(a: Point, b: Point) -> f64 {
    let dlat = a.latitude - b.latitude;
    let dlon = a.longitude - b.longitude;
    dlat * dlat + dlon * dlon
}

/// Small integer grid so equidistant targets actually occur.
fn arb_point() -> impl Strategy<Value = Point> {
    (-20i32..20, -20i32..20).prop_map(|(a, b)| Point::new(f64::from(a), f64::from(b)))
}

fn lenient() -> MatchOptions {
    MatchOptions {
        on_violation: FanOutPolicy::Warn,
        ..MatchOptions::default()
    }
}

proptest! {
    #[test]
    fn every_assignment_is_the_lowest_index_nearest(
        sources in prop::collection::vec(arb_point(), 0..60),
        targets in prop::collection::vec(arb_point(), 1..40),
    ) {
        let m = match_points(&sources, &targets, &lenient())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(m.assignments().len(), sources.len());
        for (s, &a) in sources.iter().zip(m.assignments()) {
            let best = targets
                .iter()
                .map(|t| dist2(*s, *t))
                .fold(f64::INFINITY, f64::min);
            let expected = targets.iter().position(|t| dist2(*s, *t) == best);
            prop_assert_eq!(Some(a), expected);
        }
    }

    #[test]
    fn repeated_runs_agree(
        sources in prop::collection::vec(arb_point(), 0..40),
        targets in prop::collection::vec(arb_point(), 1..40),
    ) {
        let first = match_points(&sources, &targets, &lenient()).ok();
        let second = match_points(&sources, &targets, &lenient()).ok();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn distinct_points_match_themselves(
        coords in prop::collection::btree_set((-50i32..50, -50i32..50), 1..80),
    ) {
        let points: Vec<Point> = coords
            .iter()
            .map(|&(a, b)| Point::new(f64::from(a), f64::from(b)))
            .collect();
        let m = match_points(&points, &points, &MatchOptions::default()).ok();
        let expected: Vec<usize> = (0..points.len()).collect();
        prop_assert_eq!(m.as_ref().map(|m| m.assignments().to_vec()), Some(expected));
        prop_assert_eq!(m.map(|m| m.max_fiber()), Some(1));
    }

    #[test]
    fn fan_out_error_iff_largest_fiber_exceeds_bound(
        sources in prop::collection::vec(arb_point(), 1..50),
        targets in prop::collection::vec(arb_point(), 1..10),
        bound in 1usize..8,
    ) {
        let relaxed = match_points(&sources, &targets, &lenient())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let fibers = relaxed.fibers();
        let largest = fibers.values().map(Vec::len).max().unwrap_or(0);
        prop_assert_eq!(relaxed.max_fiber(), largest);
        prop_assert_eq!(fibers.values().map(Vec::len).sum::<usize>(), sources.len());

        let strict = MatchOptions { max_fan_out: bound, ..MatchOptions::default() };
        match match_points(&sources, &targets, &strict) {
            Ok(m) => prop_assert!(m.max_fiber() <= bound),
            Err(Error::FanOut { observed, bound: b, .. }) => {
                prop_assert!(observed > bound);
                prop_assert_eq!(observed, largest);
                prop_assert_eq!(b, bound);
            }
            Err(e) => prop_assert!(false, "unexpected error {}", e),
        }
    }
}

#[test]
fn many_sites_on_one_plant_fail_with_default_bound() {
    let targets = [Point::new(39.7, -105.2), Point::new(45.0, -100.0)];
    let sources: Vec<Point> = (0..6)
        .map(|i| Point::new(39.7 + f64::from(i) * 0.01, -105.2))
        .collect();
    let result = match_points(&sources, &targets, &MatchOptions::default());
    match result {
        Err(Error::FanOut {
            observed,
            bound,
            target,
        }) => {
            assert_eq!((observed, bound, target), (6, 5, 0));
        }
        other => panic!("expected fan-out failure, got {other:?}"),
    }
}

#[test]
fn duplicate_target_coordinates_resolve_to_first() {
    let targets = [Point::new(1.0, 1.0), Point::new(1.0, 1.0)];
    let sources = [Point::new(1.5, 1.5), Point::new(0.0, 0.0)];
    let m = match_points(&sources, &targets, &MatchOptions::default()).ok();
    assert_eq!(m.map(|m| m.into_assignments()), Some(vec![0, 0]));
}

#[test]
fn csv_tables_match_with_configured_columns() {
    let ws = Workspace::new();
    let sites = ws.write("sites.csv", "site,lat,lon\ns1,40.09,-104.91\ns2,39.71,-105.19\n");
    let plants = ws.write("plants.csv", META);
    let sites = read_meta(File::open(&sites).expect("open sites")).expect("read sites");
    let plants = read_meta(File::open(&plants).expect("open plants")).expect("read plants");

    let config = ExportConfig::from_toml_str(
        r#"
[matching]
latitude_column = "lat"
longitude_column = "lon"
"#,
    )
    .expect("parse config");
    // plants use the default column names, sites the configured ones
    let result = match_tables(&sites, &plants, &config.matching.options());
    assert!(matches!(
        result,
        Err(Error::MissingCoordinates { side: PointSide::Target, .. })
    ));

    let renamed = ws.write("renamed.csv", "site,latitude,longitude\ns1,40.09,-104.91\ns2,39.71,-105.19\n");
    let sites = read_meta(File::open(&renamed).expect("open")).expect("read");
    let m = match_tables(&sites, &plants, &MatchOptions::default()).ok();
    assert_eq!(m.map(|m| m.into_assignments()), Some(vec![1, 0]));
}
