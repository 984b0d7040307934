//! Per-run shared state
//!
//! One [`RunState`] behind one lock, plus a cancellation token that closes the
//! run exactly once. The producer and every insert worker hold a clone of the
//! same [`RunHandle`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use super::coordinator::IngestError;

/// Counters and flags of one ingest run, always read and written together
#[derive(Debug, Default)]
pub struct RunState {
    /// Records handed to the insert workers
    pub lines_read: u64,
    /// Records inserted into the open transaction
    pub rows_saved: u64,
    /// The failure that closed the run, if any
    pub first_error: Option<IngestError>,
    /// Every handed-off record was saved after the source ran dry
    pub done: bool,
    /// The producer reached the end of the upload without failing
    pub source_exhausted: bool,
}

impl RunState {
    fn check_done(&mut self) {
        if self.source_exhausted && self.first_error.is_none() && self.rows_saved == self.lines_read
        {
            self.done = true;
        }
    }
}

/// Final view of a run once producer and workers have stopped
#[derive(Debug)]
pub struct RunOutcome {
    pub lines_read: u64,
    pub rows_saved: u64,
    pub done: bool,
    pub error: Option<IngestError>,
}

/// Cloneable handle on one run's state and close latch
#[derive(Debug, Clone, Default)]
pub struct RunHandle {
    state: Arc<Mutex<RunState>>,
    closed: CancellationToken,
}

impl RunHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Close the run; later calls do nothing
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the run is closed
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    pub fn has_failed(&self) -> bool {
        self.lock().first_error.is_some()
    }

    /// Record `error` unless an earlier one is already recorded, then close
    ///
    /// Returns `true` if this was the first error.
    pub fn fail(&self, error: IngestError) -> bool {
        let first = {
            let mut state = self.lock();
            if state.first_error.is_none() {
                state.first_error = Some(error);
                true
            } else {
                tracing::debug!(error = %error, "Ignoring error after the run already failed");
                false
            }
        };
        self.close();
        first
    }

    /// Count records about to be handed to the workers
    pub fn add_lines_read(&self, count: usize) {
        self.lock().lines_read += count as u64;
    }

    /// The producer will send nothing more
    pub fn finish_source(&self) {
        let mut state = self.lock();
        state.source_exhausted = true;
        state.check_done();
    }

    /// Count records a worker inserted; returns whether the run is now done
    pub fn add_rows_saved(&self, count: usize) -> bool {
        let mut state = self.lock();
        state.rows_saved += count as u64;
        state.check_done();
        state.done
    }

    /// Take the final counters and error
    pub fn outcome(&self) -> RunOutcome {
        let mut state = self.lock();
        state.check_done();
        RunOutcome {
            lines_read: state.lines_read,
            rows_saved: state.rows_saved,
            done: state.done,
            error: state.first_error.take(),
        }
    }
}
