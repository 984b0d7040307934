//! Candlestore Server Library
//!
//! HTTP server that ingests OHLC price data from CSV uploads and serves it
//! back page by page.
//!
//! # Overview
//!
//! - **Ingestion**: `POST /data` streams a CSV upload through a bounded
//!   producer/worker pipeline into one database transaction. Either every row
//!   is committed or none is.
//! - **Reads**: `GET /data` pages through stored records, with optional
//!   full-text search on PostgreSQL and a full pagination block with links.
//! - **Storage**: PostgreSQL or SQLite behind the [`db::RecordStore`] trait.
//! - **Configuration**: environment-based, see [`config::Config`].
//!
//! # Architecture
//!
//! - [`ingest`] holds the pipeline: upload checks, row parsing, batching,
//!   insert workers and the coordinator that commits or rolls back.
//! - [`features`] holds vertical slices with `commands/` (writes),
//!   `queries/` (reads) and `routes.rs`.
//! - [`api`] assembles the router, middleware stack and server loop.
//!
//! # Example
//!
//! ```no_run
//! use candlestore_server::{api, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     api::serve(config).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;

// Re-export commonly used types
pub use error::AppError;
