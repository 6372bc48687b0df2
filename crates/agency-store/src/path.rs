//! Path normalisation for store keys.
//!
//! Canonical paths start with `/`, never end with `/` (except the root
//! itself), and contain no empty, `.` or `..` segments.

use crate::error::{StoreError, StoreResult};

/// The root directory.
pub const ROOT: &str = "/";

/// Normalise a user-supplied path (`"a//b/"` → `"/a/b"`).
pub fn normalize(path: &str) -> StoreResult<String> {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}

/// Check that `segment` names exactly one level below its parent.
pub fn validate_segment(segment: &str) -> StoreResult<()> {
    if segment.is_empty() || segment == "." || segment == ".." || segment.contains('/') {
        return Err(StoreError::InvalidPath(format!(
            "invalid path segment {segment:?}"
        )));
    }
    Ok(())
}

/// Append one validated segment to a canonical path.
pub fn join(base: &str, segment: &str) -> StoreResult<String> {
    validate_segment(segment)?;
    if base == ROOT {
        Ok(format!("/{segment}"))
    } else {
        Ok(format!("{base}/{segment}"))
    }
}

/// Prefix shared by every descendant of `path`.
pub fn child_prefix(path: &str) -> String {
    if path == ROOT {
        ROOT.to_string()
    } else {
        format!("{path}/")
    }
}

/// Proper ancestors of a canonical path, root first.
pub fn ancestors(path: &str) -> Vec<String> {
    if path == ROOT {
        return Vec::new();
    }
    let mut result = vec![ROOT.to_string()];
    let mut current = String::new();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    for segment in &segments[..segments.len().saturating_sub(1)] {
        current.push('/');
        current.push_str(segment);
        result.push(current.clone());
    }
    result
}
