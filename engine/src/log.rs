//! Per-job append-only text log.
//!
//! Every line written here is mirrored to `tracing` so hosts that install a
//! subscriber see the same record.

use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::EngineError;
use crate::model::{CounterSnapshot, JobState};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Line-oriented log file owned by one job's worker.
#[derive(Debug)]
pub struct JobLog {
    job_id: Uuid,
    path: PathBuf,
    writer: BufWriter<File>,
    write_failed: bool,
}

impl JobLog {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: &Path, job_id: Uuid) -> Result<Self, EngineError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| EngineError::config(format!("cannot open log file: {e}"), path))?;
        Ok(JobLog {
            job_id,
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            write_failed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an action that was carried out.
    pub fn action(&mut self, message: impl Display) {
        tracing::info!(job = %self.job_id, "{message}");
        self.write_line(format_args!("{message}"));
    }

    /// Record a failed entry.
    pub fn failure(&mut self, message: impl Display) {
        tracing::warn!(job = %self.job_id, "{message}");
        self.write_line(format_args!("FAILED {message}"));
    }

    /// Final line of a run. Flushes the file.
    pub fn summary(&mut self, state: JobState, counters: &CounterSnapshot) {
        tracing::info!(job = %self.job_id, %state, "{counters}");
        self.write_line(format_args!("Job {state}: {counters}"));
        self.flush();
    }

    pub fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            self.report_write_error(e);
        }
    }

    fn write_line(&mut self, message: std::fmt::Arguments<'_>) {
        let stamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
        if let Err(e) = writeln!(self.writer, "[{stamp}] {message}") {
            self.report_write_error(e);
        }
    }

    fn report_write_error(&mut self, e: std::io::Error) {
        // warn once per job instead of once per line
        if !self.write_failed {
            self.write_failed = true;
            tracing::warn!(job = %self.job_id, path = %self.path.display(), "job log write failed: {e}");
        }
    }
}

impl Drop for JobLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
