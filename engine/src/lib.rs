//! # TreeSync Engine - Directory Mirroring Library
//!
//! A headless engine that makes a target directory tree mirror a source tree.
//! Designed as the foundation for multiple front ends (CLI, services, automation).
//!
//! ## Overview
//!
//! The engine walks source and target in lock-step, one directory level at a
//! time, and reconciles each level. It features:
//! - Three modes: Protocol (copy only), Sync (full mirror) and Snapshot
//!   (timestamped copies that hard-link unchanged files from the previous one)
//! - Change detection by exact modification time
//! - Directory junctions replicated as links, never followed
//! - Per-entry error isolation: one failing file never stops the run
//! - Cooperative pause, resume and abort from any thread
//! - A timestamped job log and live counters
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{BackupJob, JobState, Mode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut job = BackupJob::new(Mode::Sync);
//! job.set_source_root("/data/projects")?;
//! job.set_target_root("/mnt/backup/projects")?;
//! job.set_log_path("/var/log/treesync.log")?;
//!
//! job.start()?;
//! let handle = job.handle();
//! println!("copied so far: {}", handle.counters().files_copied);
//!
//! if job.wait() == JobState::Finished {
//!     println!("{}", job.counters());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Modes, states, entry actions, counters and job configuration
//! - **error**: Error types and handling
//! - **paths**: Root normalization and source/target path mapping
//! - **junction**: Directory junction adapter
//! - **fs_ops**: Low-level filesystem operations
//! - **classify**: Per-entry decision logic
//! - **sweep**: Orphan detection in the target
//! - **executor**: Applies actions, keeps counters and the log
//! - **walker**: Explicit-stack traversal with pause/abort checkpoints
//! - **baseline**: Snapshot directory naming and baseline selection
//! - **job**: Job lifecycle (configure, start, pause, abort, wait)
//! - **progress**: Progress callback trait
//! - **snapshot**: Point-in-time snapshot provider interface

pub mod baseline;
pub mod classify;
pub mod control;
pub mod error;
pub mod executor;
pub mod fs_ops;
pub mod job;
pub mod junction;
pub mod log;
pub mod model;
pub mod paths;
pub mod progress;
pub mod snapshot;
pub mod sweep;
pub mod walker;

// Re-export main types
pub use error::EngineError;
pub use job::{BackupJob, JobHandle};
pub use junction::{JunctionAdapter, NativeJunctions};
pub use model::{CounterSnapshot, EntryAction, JobConfig, JobState, Mode};
pub use progress::ProgressCallback;
pub use snapshot::{copy_from_snapshot, PassthroughSnapshots, SnapshotProvider};
