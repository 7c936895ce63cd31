//! Point-in-time snapshot provider interface and the ad-hoc copy built on it.
//!
//! Creating snapshots is left to the host (a volume shadow copy service or a
//! filesystem snapshot). The engine only needs the path mapping.

use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::fs_ops;

/// Maps a live path to its frozen-in-time equivalent.
pub trait SnapshotProvider {
    fn snapshot_path(&self, live_path: &Path) -> Result<PathBuf, EngineError>;
}

/// Provider for hosts without a snapshot service: every path is its own snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughSnapshots;

impl SnapshotProvider for PassthroughSnapshots {
    fn snapshot_path(&self, live_path: &Path) -> Result<PathBuf, EngineError> {
        Ok(live_path.to_path_buf())
    }
}

/// Copy one file as it exists in the snapshot, e.g. a file locked by another process.
///
/// # Returns
/// Number of bytes copied
pub fn copy_from_snapshot(
    provider: &dyn SnapshotProvider,
    live_path: &Path,
    destination: &Path,
) -> Result<u64, EngineError> {
    let frozen = provider.snapshot_path(live_path)?;
    tracing::debug!(
        live = %live_path.display(),
        frozen = %frozen.display(),
        "copying from snapshot"
    );
    fs_ops::copy_file_with_metadata(&frozen, destination)
}
