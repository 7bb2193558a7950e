//! Utility functions and helpers

mod ua;

use std::path::{Component, Path, PathBuf};

pub use ua::{parse_user_agent, UserAgent};

/// Placeholder used when shortening long paths
const ABBR: &str = "...";

/// Clean a path by removing . and .. components
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }

    if path.starts_with('/') {
        format!("/{}", parts.join("/"))
    } else {
        parts.join("/")
    }
}

/// Lexically normalize a filesystem path, resolving `.` and `..`
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Resolve `path` against `base` unless it is already absolute
pub fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&base.join(path))
    }
}

/// Shorten `path` to `first/.../last` when the segments in between are
/// longer than the placeholder itself
pub fn abbreviate_path(path: &str, sep: char) -> String {
    let parts: Vec<&str> = path.split(sep).collect();

    if parts.len() > 2 {
        let middle = parts[1..parts.len() - 1].join(&sep.to_string());
        if middle.chars().count() > ABBR.len() {
            return format!("{}{sep}{}{sep}{}", parts[0], ABBR, parts[parts.len() - 1]);
        }
    }

    path.to_string()
}
