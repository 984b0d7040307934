//! PostgreSQL-backed [`RecordStore`]
//!
//! `search` is a `to_tsquery` expression matched against a text vector built
//! from every column of the row.

use async_trait::async_trait;
use candlestore_common::PriceRecord;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};

use super::{
    acquire_timeout, column_timestamps, idle_timeout, Backend, DbResult, RecordRow, RecordStore,
    StoreTransaction, RECORDS_TABLE,
};
use crate::config::DatabaseConfig;

/// PostgreSQL accepts at most 65535 bind parameters per statement.
const MAX_ROWS_PER_STATEMENT: usize = 65_535 / 6;

const CREATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS ohlc_records (
    id BIGSERIAL PRIMARY KEY,
    unix BIGINT NOT NULL,
    symbol TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL
)";

const SEARCH_PREDICATE: &str = " WHERE to_tsvector('english', \
    unix::text || ' ' || symbol || ' ' || open::text || ' ' || \
    high::text || ' ' || low::text || ' ' || close::text) \
    @@ to_tsquery('english', ";

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(acquire_timeout(config))
            .idle_timeout(idle_timeout(config))
            .connect(&config.url)
            .await?;

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_search<'a>(builder: &mut QueryBuilder<'a, Postgres>, search: Option<&'a str>) {
        if let Some(search) = search {
            builder.push(SEARCH_PREDICATE).push_bind(search).push(")");
        }
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    fn backend(&self) -> Backend {
        Backend::Postgres
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
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn count(&self, search: Option<&str>) -> DbResult<u64> {
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {RECORDS_TABLE}"));
        Self::push_search(&mut builder, search);

        let total: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn fetch_page(
        &self,
        search: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> DbResult<Vec<PriceRecord>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT unix, symbol, open, high, low, close FROM {RECORDS_TABLE}"
        ));
        Self::push_search(&mut builder, search);
        builder
            .push(" ORDER BY id LIMIT ")
            .push_bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .push(" OFFSET ")
            .push_bind(i64::try_from(offset).unwrap_or(i64::MAX));

        let rows: Vec<RecordRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(PriceRecord::try_from).collect()
    }
}

struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn insert_batch(&mut self, records: &[PriceRecord]) -> DbResult<()> {
        let stamps = column_timestamps(records)?;

        for (chunk, stamps) in records
            .chunks(MAX_ROWS_PER_STATEMENT)
            .zip(stamps.chunks(MAX_ROWS_PER_STATEMENT))
        {
            let mut builder = QueryBuilder::<Postgres>::new(format!(
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
