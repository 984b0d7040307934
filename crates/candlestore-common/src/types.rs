//! Domain types shared by the server and its tests

use serde::{Deserialize, Serialize};

/// Column names an upload must start with, in order
pub const CSV_HEADER: [&str; 6] = ["UNIX", "SYMBOL", "OPEN", "HIGH", "LOW", "CLOSE"];

/// Number of columns in every row of an upload
pub const CSV_COLUMNS: usize = CSV_HEADER.len();

/// One OHLC observation for a symbol at a point in time
///
/// Prices are stored exactly as uploaded: no ordering between open, high,
/// low and close is checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Epoch milliseconds, the `UNIX` column
    #[serde(rename = "unix")]
    pub timestamp: u64,
    pub symbol: String,
    pub open: f32,
    pub high: f32,
    pub low: f32,
    pub close: f32,
}
