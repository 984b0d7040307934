pub mod fetch;

pub use fetch::{FetchRecordsError, FetchRecordsQuery, FetchRecordsResponse};
