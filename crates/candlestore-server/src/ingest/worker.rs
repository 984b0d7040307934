//! Insert workers
//!
//! `W` tasks share one receiver and one open transaction. Inserts are
//! serialized by the transaction lock, so at most one batch is written at a
//! time while the others wait with their batch in hand.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use super::batcher::Batch;
use super::coordinator::IngestError;
use super::state::RunHandle;
use crate::db::StoreTransaction;

pub type SharedReceiver = Arc<Mutex<mpsc::Receiver<Batch>>>;
pub type SharedTransaction = Arc<Mutex<Box<dyn StoreTransaction>>>;

/// A fixed set of insert tasks for one run
pub struct InsertWorkerPool {
    workers: JoinSet<()>,
}

impl InsertWorkerPool {
    /// Spawn `count` workers (at least one)
    pub fn spawn(
        count: usize,
        receiver: mpsc::Receiver<Batch>,
        tx: SharedTransaction,
        run: RunHandle,
    ) -> Self {
        let receiver: SharedReceiver = Arc::new(Mutex::new(receiver));
        let mut workers = JoinSet::new();

        for worker_id in 0..count.max(1) {
            workers.spawn(insert_worker(worker_id, receiver.clone(), tx.clone(), run.clone()));
        }

        Self { workers }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Wait for every worker to exit
    ///
    /// A panicked worker fails the run with [`IngestError::WorkerPanicked`].
    pub async fn join(&mut self, run: &RunHandle) {
        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    tracing::error!(error = %e, "Insert worker panicked");
                    run.fail(IngestError::WorkerPanicked);
                }
            }
        }
    }

    /// Abort every worker still running and wait until they are gone
    pub async fn shutdown(&mut self) {
        self.workers.shutdown().await;
    }
}

#[tracing::instrument(skip(receiver, tx, run))]
async fn insert_worker(
    worker_id: usize,
    receiver: SharedReceiver,
    tx: SharedTransaction,
    run: RunHandle,
) {
    let mut inserted = 0usize;

    loop {
        let batch = {
            let mut receiver = tokio::select! {
                biased;
                _ = run.closed() => break,
                guard = receiver.lock() => guard,
            };
            tokio::select! {
                biased;
                _ = run.closed() => break,
                batch = receiver.recv() => batch,
            }
        };

        // Sender dropped and channel drained.
        let Some(batch) = batch else { break };

        let mut tx = tx.lock().await;
        if run.has_failed() {
            continue;
        }

        match tx.insert_batch(&batch).await {
            Ok(()) => {
                inserted += batch.len();
                if run.add_rows_saved(batch.len()) {
                    tracing::debug!("Final batch saved");
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, rows = batch.len(), "Batch insert failed");
                run.fail(IngestError::Db(e));
                break;
            },
        }
    }

    tracing::debug!(inserted, "Insert worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::SqliteStore;
    use crate::db::RecordStore;
    use candlestore_common::PriceRecord;

    fn batch(start: u64, len: u64) -> Batch {
        (start..start + len)
            .map(|i| PriceRecord {
                timestamp: i,
                symbol: "BTCUSDT".to_string(),
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_workers_drain_channel_then_exit() {
        let store = SqliteStore::in_memory().await.unwrap();
        let tx: SharedTransaction = Arc::new(Mutex::new(store.begin().await.unwrap()));
        let run = RunHandle::new();
        let (sender, receiver) = mpsc::channel(4);

        let mut pool = InsertWorkerPool::spawn(3, receiver, tx.clone(), run.clone());
        assert_eq!(pool.len(), 3);

        for i in 0..5 {
            run.add_lines_read(10);
            sender.send(batch(i * 10, 10)).await.unwrap();
        }
        run.finish_source();
        drop(sender);

        pool.join(&run).await;
        assert!(pool.is_empty());

        let outcome = run.outcome();
        assert!(outcome.done);
        assert_eq!(outcome.rows_saved, 50);

        let tx = Arc::try_unwrap(tx).ok().unwrap().into_inner();
        tx.commit().await.unwrap();
        assert_eq!(store.count(None).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_closed_run_stops_idle_workers() {
        let store = SqliteStore::in_memory().await.unwrap();
        let tx: SharedTransaction = Arc::new(Mutex::new(store.begin().await.unwrap()));
        let run = RunHandle::new();
        let (_sender, receiver) = mpsc::channel(1);

        let mut pool = InsertWorkerPool::spawn(4, receiver, tx, run.clone());
        run.close();
        pool.join(&run).await;

        assert!(pool.is_empty());
        assert!(!run.outcome().done);
    }

    #[tokio::test]
    async fn test_zero_workers_spawns_one() {
        let store = SqliteStore::in_memory().await.unwrap();
        let tx: SharedTransaction = Arc::new(Mutex::new(store.begin().await.unwrap()));
        let (_sender, receiver) = mpsc::channel(1);

        let mut pool = InsertWorkerPool::spawn(0, receiver, tx, RunHandle::new());
        assert_eq!(pool.len(), 1);
        pool.shutdown().await;
    }
}
