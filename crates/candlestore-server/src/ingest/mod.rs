//! CSV ingestion pipeline
//!
//! # Architecture
//!
//! - **upload**: extension and header checks, before any transaction is opened
//! - **parser**: one CSV row to one [`PriceRecord`](candlestore_common::PriceRecord)
//! - **batcher**: producer that groups rows into batches and feeds the channel
//! - **worker**: insert tasks sharing the channel and the open transaction
//! - **state**: per-run counters, first error and the close latch
//! - **coordinator**: runs all of the above under a deadline, then commits or rolls back
//!
//! A run is all-or-nothing: either every row of the upload is committed, or
//! none is.

pub mod batcher;
pub mod coordinator;
pub mod parser;
pub mod state;
pub mod upload;
pub mod worker;

pub use batcher::{Batch, Batcher};
pub use coordinator::{IngestCoordinator, IngestError, IngestSummary};
pub use parser::{parse_row, RowError};
pub use state::{RunHandle, RunState};
pub use upload::{prepare, PreparedUpload, UploadError};
pub use worker::InsertWorkerPool;
