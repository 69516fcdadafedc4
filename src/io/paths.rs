//! Lexical path helpers for manifest-relative file references.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Directory containing `file`, or `.` for a bare file name.
pub fn parent_dir(file: &Path) -> &Path {
    match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Expresses `path` relative to the directory `base`.
///
/// Both are made absolute against the current directory and normalized
/// lexically; neither needs to exist.
pub fn relative_to(path: &Path, base: &Path) -> io::Result<PathBuf> {
    let path = normalize(&std::path::absolute(path)?);
    let base = normalize(&std::path::absolute(base)?);

    let common = path
        .components()
        .zip(base.components())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in base.components().skip(common) {
        rel.push("..");
    }
    for c in path.components().skip(common) {
        rel.push(c);
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    Ok(rel)
}

fn normalize(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in p.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
