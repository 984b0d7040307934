//! One ingest run from open transaction to commit or rollback
//!
//! The coordinator opens a transaction, spawns the insert workers, drives the
//! [`Batcher`] on the calling task and waits for the workers, all under the
//! run deadline. Then it commits only if every record handed off was saved
//! and nothing failed; otherwise it rolls back. A run is all-or-nothing.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use super::batcher::Batcher;
use super::parser::RowError;
use super::state::{RunHandle, RunOutcome};
use super::upload::{PreparedUpload, UploadError};
use super::worker::{InsertWorkerPool, SharedTransaction};
use crate::config::IngestConfig;
use crate::db::{DbError, RecordStore, StoreTransaction};

/// Why an upload was not stored
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Row(#[from] RowError),

    /// Begin, insert or commit failed; the driver's message is kept
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Ingest did not finish within {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// Workers stopped before every handed-off record was saved
    #[error("Ingest stopped before every row was saved")]
    Incomplete,

    #[error("An insert worker panicked")]
    WorkerPanicked,
}

impl IngestError {
    /// Whether the client sent something unusable, as opposed to a server-side failure
    pub fn is_client_error(&self) -> bool {
        matches!(self, IngestError::Upload(_))
    }
}

/// Counters of a committed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub lines_read: u64,
    pub rows_saved: u64,
}

/// Runs uploads against one store
#[derive(Clone)]
pub struct IngestCoordinator {
    store: Arc<dyn RecordStore>,
    config: IngestConfig,
}

impl IngestCoordinator {
    pub fn new(store: Arc<dyn RecordStore>, config: IngestConfig) -> Self {
        Self { store, config }
    }

    /// Ingest `upload` with a worker count derived from its size
    pub async fn run(&self, upload: PreparedUpload) -> Result<IngestSummary, IngestError> {
        let workers = self.config.worker_count(upload.size);
        self.run_with_workers(upload, workers).await
    }

    /// Ingest `upload` with exactly `workers` insert workers (at least one)
    #[tracing::instrument(
        skip(self, upload),
        fields(filename = %upload.filename, size = upload.size)
    )]
    pub async fn run_with_workers(
        &self,
        upload: PreparedUpload,
        workers: usize,
    ) -> Result<IngestSummary, IngestError> {
        let workers = workers.max(1);
        let deadline = self.config.deadline();

        let tx: SharedTransaction = Arc::new(Mutex::new(self.store.begin().await?));
        let run = RunHandle::new();
        let (sender, receiver) = mpsc::channel(workers);

        tracing::info!(workers, batch_size = self.config.batch_size, "Ingest started");

        let mut pool = InsertWorkerPool::spawn(workers, receiver, tx.clone(), run.clone());
        let batcher = Batcher::new(self.config.batch_size, sender, run.clone());
        let mut reader = upload.reader;

        let finished = tokio::time::timeout(deadline, async {
            batcher.run(&mut reader).await;
            pool.join(&run).await;
        })
        .await;

        if finished.is_err() {
            tracing::warn!(deadline_secs = deadline.as_secs(), "Ingest deadline expired");
            run.close();
            pool.shutdown().await;
            discard(tx).await;
            return Err(IngestError::Timeout(deadline));
        }

        let tx = take_transaction(tx)?;

        match run.outcome() {
            RunOutcome {
                lines_read,
                rows_saved,
                done: true,
                error: None,
            } => {
                tx.commit().await?;
                tracing::info!(lines_read, rows_saved, "Ingest committed");
                Ok(IngestSummary {
                    lines_read,
                    rows_saved,
                })
            },
            RunOutcome {
                lines_read,
                rows_saved,
                error,
                ..
            } => {
                let error = error.unwrap_or(IngestError::Incomplete);
                tracing::warn!(lines_read, rows_saved, error = %error, "Ingest rolled back");
                rollback(tx).await;
                Err(error)
            },
        }
    }
}

/// Reclaim the transaction once every worker has released its handle
fn take_transaction(tx: SharedTransaction) -> Result<Box<dyn StoreTransaction>, IngestError> {
    Arc::try_unwrap(tx)
        .map(Mutex::into_inner)
        .map_err(|_| IngestError::Incomplete)
}

/// Roll back if the transaction can be reclaimed
///
/// Otherwise the inserts are discarded when the last handle drops.
async fn discard(tx: SharedTransaction) {
    match take_transaction(tx) {
        Ok(tx) => rollback(tx).await,
        Err(e) => tracing::error!(error = %e, "Transaction still shared, leaving it to drop"),
    }
}

async fn rollback(tx: Box<dyn StoreTransaction>) {
    if let Err(e) = tx.rollback().await {
        tracing::error!(error = %e, "Rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::SqliteStore;
    use crate::ingest::upload::prepare;

    const HEADER: &str = "UNIX,SYMBOL,OPEN,HIGH,LOW,CLOSE\n";

    fn csv(rows: usize) -> Vec<u8> {
        let mut body = HEADER.to_string();
        for i in 0..rows {
            let unix = 1_644_719_700_000u64 + i as u64;
            body.push_str(&format!("{unix},BTCUSDT,{i}.5,{i}.9,{i}.1,{i}.7\n"));
        }
        body.into_bytes()
    }

    fn small_batches() -> IngestConfig {
        IngestConfig {
            batch_size: 3,
            ..IngestConfig::default()
        }
    }

    async fn coordinator(config: IngestConfig) -> (IngestCoordinator, Arc<dyn RecordStore>) {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().await.unwrap());
        (IngestCoordinator::new(store.clone(), config), store)
    }

    #[tokio::test]
    async fn test_commits_every_row() {
        let (coordinator, store) = coordinator(small_batches()).await;

        let summary = coordinator
            .run_with_workers(prepare("a.csv", csv(10)).unwrap(), 2)
            .await
            .unwrap();

        assert_eq!(summary, IngestSummary { lines_read: 10, rows_saved: 10 });
        assert_eq!(store.count(None).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_header_only_commits_nothing() {
        let (coordinator, store) = coordinator(small_batches()).await;

        let summary = coordinator
            .run_with_workers(prepare("a.csv", csv(0)).unwrap(), 4)
            .await
            .unwrap();

        assert_eq!(summary, IngestSummary { lines_read: 0, rows_saved: 0 });
        assert_eq!(store.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bad_row_rolls_back_everything() {
        let (coordinator, store) = coordinator(small_batches()).await;
        let mut body = csv(8);
        body.extend_from_slice(b"1644719700099,BTCUSDT,1,2,3\n");

        let err = coordinator
            .run_with_workers(prepare("a.csv", body).unwrap(), 3)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Row(RowError::Malformed { line: 10, fields: 5 })));
        assert!(!err.is_client_error());
        assert_eq!(store.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_deadline_rolls_back() {
        let (coordinator, store) = coordinator(IngestConfig {
            deadline_secs: 0,
            ..small_batches()
        })
        .await;

        let err = coordinator
            .run_with_workers(prepare("a.csv", csv(50)).unwrap(), 1)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Timeout(_)));
        assert_eq!(err.to_string(), "Ingest did not finish within 0 seconds");
        assert_eq!(store.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_discard_with_outstanding_handle_commits_nothing() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        tx.insert_batch(&[candlestore_common::PriceRecord {
            timestamp: 1,
            symbol: "BTCUSDT".to_string(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
        }])
        .await
        .unwrap();

        let tx: SharedTransaction = Arc::new(Mutex::new(tx));
        let straggler = tx.clone();
        discard(tx).await;
        drop(straggler);

        assert_eq!(store.count(None).await.unwrap(), 0);
    }

    #[test]
    fn test_upload_errors_are_client_errors() {
        assert!(IngestError::Upload(UploadError::InvalidHeader).is_client_error());
        assert!(!IngestError::Incomplete.is_client_error());
    }
}
