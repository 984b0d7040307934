//! Upload preconditions
//!
//! Everything here runs before a transaction is opened. A rejected upload
//! never touches storage.

use std::io::Cursor;

use bytes::Bytes;
use candlestore_common::{CSV_COLUMNS, CSV_HEADER};
use csv::{Reader, ReaderBuilder, StringRecord};
use thiserror::Error;

/// An upload rejected before ingestion started
#[derive(Error, Debug)]
pub enum UploadError {
    /// No `csv_file` part in the multipart body
    #[error("Form cannot be parsed: missing field '{0}'")]
    MissingField(&'static str),

    /// The multipart body could not be read
    #[error("Form cannot be parsed: {0}")]
    Unreadable(String),

    #[error("Expected a csv file")]
    NotCsv { filename: String },

    /// First row missing or not `UNIX,SYMBOL,OPEN,HIGH,LOW,CLOSE`
    #[error("Csv file is not valid")]
    InvalidHeader,
}

/// An upload that passed every precondition
///
/// The header row has been consumed; the reader yields data rows only.
pub struct PreparedUpload {
    pub filename: String,
    /// Raw size in bytes, drives the worker count
    pub size: u64,
    pub reader: Reader<Cursor<Bytes>>,
}

impl std::fmt::Debug for PreparedUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedUpload")
            .field("filename", &self.filename)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Check the file name and header of an upload
///
/// The reader borrows `contents` in place; the upload is never copied.
pub fn prepare(
    filename: &str,
    contents: impl Into<Bytes>,
) -> Result<PreparedUpload, UploadError> {
    let contents = contents.into();

    if !has_csv_extension(filename) {
        return Err(UploadError::NotCsv {
            filename: filename.to_string(),
        });
    }

    let size = contents.len() as u64;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(contents));

    let mut header = StringRecord::new();
    match reader.read_record(&mut header) {
        Ok(true) if is_valid_header(&header) => {},
        Ok(_) => return Err(UploadError::InvalidHeader),
        Err(e) => {
            tracing::debug!(error = %e, "Upload header could not be read");
            return Err(UploadError::InvalidHeader);
        },
    }

    Ok(PreparedUpload {
        filename: filename.to_string(),
        size,
        reader,
    })
}

/// Case-insensitive `.csv` extension check
pub fn has_csv_extension(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Exactly six columns matching the expected names, ignoring case
pub fn is_valid_header(header: &StringRecord) -> bool {
    header.len() == CSV_COLUMNS
        && header
            .iter()
            .zip(CSV_HEADER)
            .all(|(found, expected)| found.eq_ignore_ascii_case(expected))
}
