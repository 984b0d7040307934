//! Price records: CSV ingestion and paged reads

pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{IngestCsvCommand, IngestCsvResponse};
pub use queries::{FetchRecordsError, FetchRecordsQuery, FetchRecordsResponse};
pub use routes::records_routes;
