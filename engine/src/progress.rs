//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which lets a host watch a
//! running job without polling. Polling `JobHandle::state` and
//! `JobHandle::counters` remains the primary interface; callbacks are optional.

use std::path::Path;

use crate::error::EngineError;
use crate::model::{CounterSnapshot, EntryAction, JobState, Mode};

/// Trait for receiving progress updates from a backup job.
///
/// All methods are called synchronously on the job's worker thread. A
/// callback may call back into the job through a `JobHandle` (for example to
/// pause or abort), but must not block for long.
pub trait ProgressCallback: Send + Sync {
    /// Called once the worker has started, before the first directory.
    fn on_job_started(&self, mode: Mode, source_root: &Path, effective_target_root: &Path);

    /// Called when a source directory is about to be reconciled.
    fn on_directory_started(&self, source_dir: &Path);

    /// Called after an action was attempted.
    fn on_action_completed(&self, action: &EntryAction, outcome: Result<(), &EngineError>);

    /// Called once the job has reached its terminal state and written its summary.
    fn on_job_completed(&self, state: JobState, counters: &CounterSnapshot);
}
