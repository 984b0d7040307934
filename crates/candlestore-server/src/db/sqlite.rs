//! SQLite-backed [`RecordStore`]
//!
//! Used for local runs and tests. SQLite has no `to_tsvector`, so `search` is
//! accepted and ignored.

use async_trait::async_trait;
use candlestore_common::PriceRecord;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, Transaction};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{
    acquire_timeout, column_timestamps, idle_timeout, Backend, DbResult, RecordRow, RecordStore,
    StoreTransaction, RECORDS_TABLE,
};
use crate::config::DatabaseConfig;

/// SQLite's default limit is 32766 bound variables per statement.
const MAX_ROWS_PER_STATEMENT: usize = 32_766 / 6;

const CREATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS ohlc_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    unix INTEGER NOT NULL,
    symbol TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL
)";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the pool for `config.url`
    ///
    /// An in-memory database is dropped with its last connection, so for
    /// in-memory URLs one connection is kept open for the life of the pool.
    /// Pass a shared-cache URL (`mode=memory&cache=shared`) so every
    /// connection of the pool sees the same database.
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(acquire_timeout(config));

        let options = if is_in_memory(&config.url) {
            options
                .min_connections(config.min_connections.max(1))
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options
                .min_connections(config.min_connections)
                .idle_timeout(idle_timeout(config))
        };

        let pool = options.connect(&config.url).await?;

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A fresh private in-memory database with the table already created
    pub async fn in_memory() -> DbResult<Self> {
        let id = NEXT_MEMORY_DB.fetch_add(1, Ordering::Relaxed);
        let config = DatabaseConfig {
            url: format!("sqlite:file:candlestore-{id}?mode=memory&cache=shared"),
            ..crate::config::Config::default().database
        };
        let store = Self::connect(&config).await?;
        store.ensure_schema().await?;
        Ok(store)
    }
}

/// Names private in-memory databases within this process
static NEXT_MEMORY_DB: AtomicUsize = AtomicUsize::new(0);

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

fn log_ignored_search(search: Option<&str>) {
    if let Some(search) = search {
        tracing::debug!(
            search,
            "Full-text search is not available on SQLite, returning unfiltered rows"
        );
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    async fn ensure_schema(&self) -> DbResult<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    async fn count(&self, search: Option<&str>) -> DbResult<u64> {
        log_ignored_search(search);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {RECORDS_TABLE}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn fetch_page(
        &self,
        search: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> DbResult<Vec<PriceRecord>> {
        log_ignored_search(search);

        let sql = format!(
            "SELECT unix, symbol, open, high, low, close FROM {RECORDS_TABLE} \
             ORDER BY id LIMIT ? OFFSET ?"
        );
        let rows: Vec<RecordRow> = sqlx::query_as(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(PriceRecord::try_from).collect()
    }
}

struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn insert_batch(&mut self, records: &[PriceRecord]) -> DbResult<()> {
        let stamps = column_timestamps(records)?;

        for (chunk, stamps) in records
            .chunks(MAX_ROWS_PER_STATEMENT)
            .zip(stamps.chunks(MAX_ROWS_PER_STATEMENT))
        {
            let mut builder = QueryBuilder::<Sqlite>::new(format!(
                "INSERT INTO {RECORDS_TABLE} (unix, symbol, open, high, low, close) "
            ));
            builder.push_values(chunk.iter().zip(stamps), |mut row, (record, unix)| {
                row.push_bind(*unix)
                    .push_bind(record.symbol.as_str())
                    .push_bind(record.open)
                    .push_bind(record.high)
                    .push_bind(record.low)
                    .push_bind(record.close);
            });
            builder.build().execute(&mut *self.tx).await?;
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
