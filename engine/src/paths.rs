//! Root substitution between the source, target and baseline trees.

use std::path::{Path, PathBuf, MAIN_SEPARATOR_STR};

use crate::error::EngineError;

/// Normalize a root so it ends with exactly one trailing separator.
///
/// Works on the raw `OsStr`, so names that are not valid UTF-8 survive
/// unchanged. A bare filesystem root (`/`) is returned as is.
pub fn normalize_root(root: &Path) -> PathBuf {
    // collecting components drops trailing (and repeated) separators
    let rebuilt: PathBuf = root.components().collect();
    if rebuilt.parent().is_none() {
        return root.to_path_buf();
    }
    let mut normalized = rebuilt.into_os_string();
    normalized.push(MAIN_SEPARATOR_STR);
    PathBuf::from(normalized)
}

/// Maps paths under one root to the same relative location under another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMap {
    from: PathBuf,
    to: PathBuf,
}

impl PathMap {
    pub fn new(from: &Path, to: &Path) -> Self {
        PathMap {
            from: normalize_root(from),
            to: normalize_root(to),
        }
    }

    pub fn from_root(&self) -> &Path {
        &self.from
    }

    pub fn to_root(&self) -> &Path {
        &self.to
    }

    /// The same substitution in the opposite direction.
    pub fn reversed(&self) -> Self {
        PathMap {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }

    /// Map `path` (under the `from` root) to its counterpart under the `to` root.
    ///
    /// The remainder after the root is carried over component for component,
    /// so case and file names are preserved.
    pub fn map(&self, path: &Path) -> Result<PathBuf, EngineError> {
        let relative = path
            .strip_prefix(&self.from)
            .map_err(|_| EngineError::PathOutsideRoot {
                path: path.to_path_buf(),
                root: self.from.clone(),
            })?;
        if relative.as_os_str().is_empty() {
            return Ok(self.to.clone());
        }
        Ok(self.to.join(relative))
    }
}
