//! Candlestore Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared pieces used by every candlestore workspace member:
//!
//! - **Logging**: tracing subscriber setup driven by environment variables
//! - **Types**: the OHLC price record and the CSV layout it is read from

pub mod logging;
pub mod types;

pub use types::{PriceRecord, CSV_COLUMNS, CSV_HEADER};
