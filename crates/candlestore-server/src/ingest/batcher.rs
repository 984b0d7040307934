//! The producer side of an ingest run
//!
//! Reads rows in order, groups them into batches of `batch_size` and hands each
//! full batch to the insert workers through a bounded channel. A full channel
//! blocks the producer until a worker frees a slot.

use std::io::Read;

use candlestore_common::PriceRecord;
use csv::{Reader, StringRecord};
use tokio::sync::mpsc;

use super::parser::{parse_row, RowError};
use super::state::RunHandle;

/// Records moved to one worker in one hand-off
pub type Batch = Vec<PriceRecord>;

pub struct Batcher {
    batch_size: usize,
    sender: mpsc::Sender<Batch>,
    run: RunHandle,
}

impl Batcher {
    pub fn new(batch_size: usize, sender: mpsc::Sender<Batch>, run: RunHandle) -> Self {
        Self {
            batch_size: batch_size.max(1),
            sender,
            run,
        }
    }

    /// Drain `reader` into the channel
    ///
    /// Stops at the first bad row or as soon as the run is closed. The sender
    /// is dropped on return, which tells the workers no more batches follow.
    #[tracing::instrument(skip_all, fields(batch_size = self.batch_size))]
    pub async fn run<R: Read>(self, reader: &mut Reader<R>) {
        let mut pending = Vec::with_capacity(self.batch_size);
        let mut row = StringRecord::new();
        let mut batches = 0u64;
        // The header was line 1.
        let mut line = 1u64;

        loop {
            if self.run.is_closed() {
                tracing::debug!("Run closed, producer stopping");
                return;
            }

            match reader.read_record(&mut row) {
                Ok(true) => {},
                Ok(false) => break,
                Err(e) => {
                    self.run.fail(RowError::Csv(e).into());
                    return;
                },
            }

            line = row.position().map_or(line + 1, |p| p.line());

            match parse_row(&row, line) {
                Ok(record) => pending.push(record),
                Err(e) => {
                    tracing::warn!(line, error = %e, "Rejecting upload at invalid row");
                    self.run.fail(e.into());
                    return;
                },
            }

            if pending.len() >= self.batch_size {
                let batch = std::mem::replace(&mut pending, Vec::with_capacity(self.batch_size));
                if !self.hand_off(batch).await {
                    return;
                }
                batches += 1;
            }
        }

        if !pending.is_empty() {
            if self.run.has_failed() || !self.hand_off(pending).await {
                return;
            }
            batches += 1;
        }

        tracing::debug!(batches, "Upload fully read");
        self.run.finish_source();
    }

    /// Returns `false` if the run closed or every worker is gone.
    async fn hand_off(&self, batch: Batch) -> bool {
        self.run.add_lines_read(batch.len());

        tokio::select! {
            biased;
            _ = self.run.closed() => false,
            sent = self.sender.send(batch) => sent.is_ok(),
        }
    }
}
