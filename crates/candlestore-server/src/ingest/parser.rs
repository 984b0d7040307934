//! Row parsing
//!
//! Turns one already-split CSV row into a [`PriceRecord`]. Pure; the caller
//! decides what a failure means for the run.

use candlestore_common::{PriceRecord, CSV_COLUMNS, CSV_HEADER};
use csv::StringRecord;
use thiserror::Error;

/// A row that could not become a [`PriceRecord`]
#[derive(Error, Debug)]
pub enum RowError {
    /// Wrong number of fields
    #[error("Invalid row detected: line {line} has {fields} fields, expected 6")]
    Malformed { line: u64, fields: usize },

    /// A numeric column did not parse
    #[error("Invalid row detected: line {line} has invalid {column} value '{value}'")]
    Field {
        line: u64,
        column: &'static str,
        value: String,
    },

    /// The reader itself failed (bad quoting, invalid UTF-8)
    #[error("Invalid row detected: {0}")]
    Csv(#[from] csv::Error),
}

/// Parse one row of an upload
///
/// `line` is the 1-based line number used in error reports.
pub fn parse_row(row: &StringRecord, line: u64) -> Result<PriceRecord, RowError> {
    if row.len() != CSV_COLUMNS {
        return Err(RowError::Malformed {
            line,
            fields: row.len(),
        });
    }

    let timestamp = row[0].parse::<u64>().map_err(|_| field_error(row, 0, line))?;

    Ok(PriceRecord {
        timestamp,
        symbol: row[1].to_string(),
        open: parse_price(row, 2, line)?,
        high: parse_price(row, 3, line)?,
        low: parse_price(row, 4, line)?,
        close: parse_price(row, 5, line)?,
    })
}

/// Prices are parsed at full width, then narrowed to the stored `f32`.
fn parse_price(row: &StringRecord, index: usize, line: u64) -> Result<f32, RowError> {
    row[index]
        .parse::<f64>()
        .map(|value| value as f32)
        .map_err(|_| field_error(row, index, line))
}

fn field_error(row: &StringRecord, index: usize, line: u64) -> RowError {
    RowError::Field {
        line,
        column: CSV_HEADER[index],
        value: row[index].to_string(),
    }
}
