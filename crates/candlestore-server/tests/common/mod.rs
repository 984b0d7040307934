//! Common test utilities for candlestore integration tests
//!
//! Everything runs against private SQLite in-memory databases, so no external
//! services are needed.
//!
//! # Contents
//!
//! - [`sqlite_store`]: fresh store with the records table created
//! - [`csv_body`] / [`price_row`]: upload fixtures
//! - [`FaultyStore`]: wraps a store and fails, panics or slows chosen inserts,
//!   or fails the commit
//! - [`multipart`]: builds a `multipart/form-data` request body

#![allow(dead_code)]

use async_trait::async_trait;
use candlestore_common::PriceRecord;
use candlestore_server::db::sqlite::SqliteStore;
use candlestore_server::db::{Backend, DbError, DbResult, RecordStore, StoreTransaction};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const HEADER: &str = "UNIX,SYMBOL,OPEN,HIGH,LOW,CLOSE";
pub const BOUNDARY: &str = "candlestore-test-boundary";

// ============================================================================
// Stores
// ============================================================================

pub async fn sqlite_store() -> Arc<dyn RecordStore> {
    Arc::new(SqliteStore::in_memory().await.expect("Failed to open SQLite store"))
}

/// Store that injects failures into an otherwise working SQLite store
///
/// Insert calls are counted across every transaction it opens; the call whose
/// 1-based index is in `fail_inserts` returns an error instead of inserting,
/// and one in `panic_inserts` panics.
pub struct FaultyStore {
    inner: SqliteStore,
    faults: Faults,
    inserts: Arc<AtomicUsize>,
}

#[derive(Clone, Default)]
struct Faults {
    fail_inserts: Vec<usize>,
    panic_inserts: Vec<usize>,
    fail_commit: bool,
    insert_delay: Option<Duration>,
}

impl FaultyStore {
    pub async fn new() -> Self {
        Self {
            inner: SqliteStore::in_memory().await.expect("Failed to open SQLite store"),
            faults: Faults::default(),
            inserts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_insert(mut self, call: usize) -> Self {
        self.faults.fail_inserts.push(call);
        self
    }

    pub fn panicking_insert(mut self, call: usize) -> Self {
        self.faults.panic_inserts.push(call);
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.faults.fail_commit = true;
        self
    }

    /// Every insert sleeps for `delay` first
    pub fn slow_inserts(mut self, delay: Duration) -> Self {
        self.faults.insert_delay = Some(delay);
        self
    }

    /// Shared counter of insert calls made so far
    pub fn insert_calls(&self) -> Arc<AtomicUsize> {
        self.inserts.clone()
    }
}

pub fn injected(what: &str) -> DbError {
    DbError::Sqlx(sqlx::Error::Protocol(format!("injected {what} failure")))
}

#[async_trait]
impl RecordStore for FaultyStore {
    fn backend(&self) -> Backend {
        self.inner.backend()
    }

    async fn ensure_schema(&self) -> DbResult<()> {
        self.inner.ensure_schema().await
    }

    async fn ping(&self) -> DbResult<()> {
        self.inner.ping().await
    }

    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin().await?,
            faults: self.faults.clone(),
            inserts: self.inserts.clone(),
        }))
    }

    async fn count(&self, search: Option<&str>) -> DbResult<u64> {
        self.inner.count(search).await
    }

    async fn fetch_page(
        &self,
        search: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> DbResult<Vec<PriceRecord>> {
        self.inner.fetch_page(search, limit, offset).await
    }
}

struct FaultyTransaction {
    inner: Box<dyn StoreTransaction>,
    faults: Faults,
    inserts: Arc<AtomicUsize>,
}

#[async_trait]
impl StoreTransaction for FaultyTransaction {
    async fn insert_batch(&mut self, records: &[PriceRecord]) -> DbResult<()> {
        let call = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.faults.insert_delay {
            tokio::time::sleep(delay).await;
        }
        if self.faults.fail_inserts.contains(&call) {
            return Err(injected(&format!("insert #{call}")));
        }
        if self.faults.panic_inserts.contains(&call) {
            panic!("injected insert #{call} panic");
        }
        self.inner.insert_batch(records).await
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        if self.faults.fail_commit {
            self.inner.rollback().await?;
            return Err(injected("commit"));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        self.inner.rollback().await
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Deterministic data row number `i`
pub fn price_row(i: usize) -> String {
    let unix = 1_644_719_700_000u64 + 60_000 * i as u64;
    let symbol = ["BTCUSDT", "ETHUSDT", "SOLUSDT"][i % 3];
    format!("{unix},{symbol},{i}.25,{i}.75,{i}.125,{i}.5")
}

/// A complete upload: header plus `rows` data rows
pub fn csv_body(rows: usize) -> String {
    let mut body = String::from(HEADER);
    body.push('\n');
    for i in 0..rows {
        body.push_str(&price_row(i));
        body.push('\n');
    }
    body
}

/// The records `csv_body(rows)` describes
pub fn expected_records(rows: usize) -> Vec<PriceRecord> {
    (0..rows)
        .map(|i| {
            let fields: Vec<String> = price_row(i).split(',').map(str::to_string).collect();
            PriceRecord {
                timestamp: fields[0].parse().expect("fixture timestamp"),
                symbol: fields[1].clone(),
                open: fields[2].parse::<f64>().expect("fixture price") as f32,
                high: fields[3].parse::<f64>().expect("fixture price") as f32,
                low: fields[4].parse::<f64>().expect("fixture price") as f32,
                close: fields[5].parse::<f64>().expect("fixture price") as f32,
            }
        })
        .collect()
}

/// Every stored record, in storage order
pub async fn stored_records(store: &dyn RecordStore) -> Vec<PriceRecord> {
    store
        .fetch_page(None, u32::MAX as u64, 0)
        .await
        .expect("Failed to read back records")
}

// ============================================================================
// HTTP
// ============================================================================

/// `(content type, body)` of a multipart form with one file part
pub fn multipart(field: &str, filename: &str, content: &str) -> (String, String) {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\
         \r\n\
         {content}\r\n\
         --{BOUNDARY}--\r\n"
    );
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}
