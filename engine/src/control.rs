//! Cooperative pause/abort signalling between a job and its worker.

use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;
use std::time::Duration;

const RUN: u8 = 0;
const PAUSE: u8 = 1;
const ABORT: u8 = 2;

/// How often a paused worker re-checks the signal.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Three-state control flag: running, paused, abort requested.
///
/// Abort is sticky: once requested, pause toggles no longer change the flag.
#[derive(Debug, Default)]
pub struct JobControl {
    signal: AtomicU8,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_abort(&self) {
        self.signal.store(ABORT, Ordering::SeqCst);
    }

    pub fn is_abort_requested(&self) -> bool {
        self.signal.load(Ordering::SeqCst) == ABORT
    }

    pub fn is_paused(&self) -> bool {
        self.signal.load(Ordering::SeqCst) == PAUSE
    }

    pub fn pause(&self) {
        let _ = self
            .signal
            .compare_exchange(RUN, PAUSE, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        let _ = self
            .signal
            .compare_exchange(PAUSE, RUN, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub(crate) fn reset(&self) {
        self.signal.store(RUN, Ordering::SeqCst);
    }

    /// Block while paused.
    ///
    /// Returns `false` if an abort was requested, `true` once running again.
    pub fn wait_while_paused(&self) -> bool {
        loop {
            match self.signal.load(Ordering::SeqCst) {
                ABORT => return false,
                PAUSE => thread::sleep(PAUSE_POLL_INTERVAL),
                _ => return true,
            }
        }
    }
}
