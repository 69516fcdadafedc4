//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Two wind plants with coordinates but no manifest columns.
pub const META: &str = "\
component_name,latitude,longitude,capacity
wind_1,39.7,-105.2,20
wind_2,40.1,-104.9,35
";

/// Hourly profiles for [`META`], starting 2007-01-01T00:00.
pub const PROFILES: &str = "\
DateTime,wind_1,wind_2
2007-01-01T00:00:00,0.5,0.25
2007-01-01T01:00:00,0.75,0
2007-01-01T02:00:00,1,0.125
";

/// Second forecast horizon for [`META`], shifted one hour later.
pub const PROFILES_SHIFTED: &str = "\
DateTime,wind_1,wind_2
2007-01-01T01:00:00,0.6,0.2
2007-01-01T02:00:00,0.9,0.1
2007-01-01T03:00:00,0.3,0.4
";

/// Scratch directory removed on drop.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `contents` to `name` inside the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, contents).expect("write fixture");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.dir.path().join(name)).expect("read output")
    }
}
