//! Relational storage for price records
//!
//! The ingest pipeline and the read endpoint only see the [`RecordStore`] and
//! [`StoreTransaction`] traits. Two backends implement them:
//!
//! - [`postgres::PostgresStore`] for `postgres://` URLs, with full-text search
//! - [`sqlite::SqliteStore`] for `sqlite:` URLs, where `search` is ignored
//!
//! Pick one from configuration with [`connect`].

use async_trait::async_trait;
use candlestore_common::PriceRecord;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::DatabaseConfig;

pub mod postgres;
pub mod sqlite;

/// Table holding every committed record
pub const RECORDS_TABLE: &str = "ohlc_records";

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQL query, connection or transaction failure, message kept verbatim
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),

    /// Timestamp larger than the signed 64-bit column can hold
    #[error("timestamp {0} is out of range for the storage column")]
    TimestampOutOfRange(u64),

    /// A stored row holds a timestamp no upload could have produced
    #[error("stored timestamp {0} is negative")]
    NegativeTimestamp(i64),

    /// Database configuration is invalid or missing
    #[error("Database configuration error: {0}. Check DATABASE_URL and connection settings.")]
    Config(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Which engine sits behind a [`RecordStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    /// Whether `search` filters rows on this engine
    pub fn supports_full_text_search(self) -> bool {
        matches!(self, Backend::Postgres)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Postgres => "postgres",
            Backend::Sqlite => "sqlite",
        }
    }

    /// Backend named by a database URL
    pub fn from_url(url: &str) -> DbResult<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Backend::Postgres)
        } else if url.starts_with("sqlite:") {
            Ok(Backend::Sqlite)
        } else {
            Err(DbError::Config(format!("unsupported database url scheme in '{}'", url)))
        }
    }
}

/// Read access plus the ability to open a write transaction
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn RecordStore>`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn backend(&self) -> Backend;

    /// Create the records table if it does not exist yet
    async fn ensure_schema(&self) -> DbResult<()>;

    /// Round-trip a trivial query, used by the health check
    async fn ping(&self) -> DbResult<()>;

    /// Open a transaction that batches are inserted into
    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>>;

    /// Number of committed records, filtered by `search` where supported
    async fn count(&self, search: Option<&str>) -> DbResult<u64>;

    /// One page of committed records in insertion order
    async fn fetch_page(
        &self,
        search: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> DbResult<Vec<PriceRecord>>;
}

/// An open write transaction
///
/// Nothing inserted is visible to readers until [`commit`](Self::commit).
/// Dropping without committing discards the inserts.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Insert every record of `records`, preserving their order
    async fn insert_batch(&mut self, records: &[PriceRecord]) -> DbResult<()>;

    async fn commit(self: Box<Self>) -> DbResult<()>;

    async fn rollback(self: Box<Self>) -> DbResult<()>;
}

/// Connect to the database named in `config` and make sure the table exists
pub async fn connect(config: &DatabaseConfig) -> DbResult<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match Backend::from_url(&config.url)? {
        Backend::Postgres => Arc::new(postgres::PostgresStore::connect(config).await?),
        Backend::Sqlite => Arc::new(sqlite::SqliteStore::connect(config).await?),
    };

    store.ensure_schema().await?;

    tracing::info!(backend = store.backend().as_str(), "Record store ready");

    Ok(store)
}

pub(crate) fn acquire_timeout(config: &DatabaseConfig) -> Duration {
    Duration::from_secs(config.connect_timeout_secs)
}

pub(crate) fn idle_timeout(config: &DatabaseConfig) -> Duration {
    Duration::from_secs(config.idle_timeout_secs)
}

/// Convert upload timestamps to the signed column type before any row is bound
pub(crate) fn column_timestamps(records: &[PriceRecord]) -> DbResult<Vec<i64>> {
    records
        .iter()
        .map(|r| i64::try_from(r.timestamp).map_err(|_| DbError::TimestampOutOfRange(r.timestamp)))
        .collect()
}

/// Row shape shared by both backends' page queries
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RecordRow {
    pub unix: i64,
    pub symbol: String,
    pub open: f32,
    pub high: f32,
    pub low: f32,
    pub close: f32,
}

impl TryFrom<RecordRow> for PriceRecord {
    type Error = DbError;

    fn try_from(row: RecordRow) -> DbResult<Self> {
        Ok(PriceRecord {
            timestamp: u64::try_from(row.unix).map_err(|_| DbError::NegativeTimestamp(row.unix))?,
            symbol: row.symbol,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
        })
    }
}
