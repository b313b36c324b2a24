//! Path helpers for the remote node tree.
//!
//! [`real_path`] is the single normalisation step every public entry point
//! applies before touching the session or a local table.

use crate::constants::PATH_SEPARATOR;
use crate::constants::ROOT_PATH;
use crate::ProgrammerError;
use crate::Result;

/// Canonical absolute form of `path`.
///
/// Adds the leading separator, collapses repeated separators and strips
/// trailing ones. The empty string and `/` both map to the root.
/// Idempotent: `real_path(&real_path(p)) == real_path(p)`.
pub fn real_path(path: &str) -> String {
    let mut real = String::with_capacity(path.len() + 1);
    for segment in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
        real.push(PATH_SEPARATOR);
        real.push_str(segment);
    }
    if real.is_empty() {
        real.push_str(ROOT_PATH);
    }
    real
}

/// Joins a canonical parent with a single child name
pub fn join(
    parent: &str,
    child: &str,
) -> String {
    if parent == ROOT_PATH {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

/// Parent of a canonical path; `None` for the root
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT_PATH {
        return None;
    }
    match path.rfind(PATH_SEPARATOR) {
        Some(0) => Some(ROOT_PATH),
        Some(i) => Some(&path[..i]),
        None => None,
    }
}

/// Last segment of a canonical path; empty for the root
pub fn node_name(path: &str) -> &str {
    match path.rfind(PATH_SEPARATOR) {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Number of segments between `ancestor` and `path`, if `path` lies under it
pub(crate) fn depth_below(
    ancestor: &str,
    path: &str,
) -> Option<usize> {
    if path == ancestor {
        return Some(0);
    }
    let rest = if ancestor == ROOT_PATH {
        path.strip_prefix(ROOT_PATH)?
    } else {
        path.strip_prefix(ancestor)?.strip_prefix(PATH_SEPARATOR)?
    };
    if rest.is_empty() {
        return None;
    }
    Some(rest.split(PATH_SEPARATOR).count())
}

/// Rejects segments the service refuses (`.` and `..`)
pub(crate) fn validate(path: &str) -> Result<()> {
    let bad = path
        .split(PATH_SEPARATOR)
        .any(|segment| segment == "." || segment == "..");
    if bad {
        return Err(ProgrammerError::InvalidPath {
            path: path.to_string(),
            reason: "relative segments are not allowed",
        }
        .into());
    }
    Ok(())
}
