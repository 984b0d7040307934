use bytes::Bytes;
use serde::Serialize;

use crate::ingest::{prepare, IngestCoordinator, IngestError, IngestSummary};

/// One uploaded CSV file
#[derive(Clone)]
pub struct IngestCsvCommand {
    pub filename: String,
    pub content: Bytes,
}

impl std::fmt::Debug for IngestCsvCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestCsvCommand")
            .field("filename", &self.filename)
            .field("size", &self.content.len())
            .finish()
    }
}

/// Counters rendered as decimal strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestCsvResponse {
    pub csv_lines_read: String,
    pub total_saved_rows: String,
}

impl From<IngestSummary> for IngestCsvResponse {
    fn from(summary: IngestSummary) -> Self {
        Self {
            csv_lines_read: summary.lines_read.to_string(),
            total_saved_rows: summary.rows_saved.to_string(),
        }
    }
}

#[tracing::instrument(skip(coordinator, command), fields(filename = %command.filename))]
pub async fn handle(
    coordinator: &IngestCoordinator,
    command: IngestCsvCommand,
) -> Result<IngestCsvResponse, IngestError> {
    let upload = prepare(&command.filename, command.content)?;
    let summary = coordinator.run(upload).await?;
    Ok(summary.into())
}
