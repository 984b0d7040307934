//! Price record API routes
//!
//! # Route Structure
//!
//! - `POST /data` - Ingest a CSV upload (multipart field `csv_file`)
//! - `GET /data` - Page through stored records

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Query, State},
    http::{header, HeaderMap, Uri},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};

use super::commands::IngestCsvCommand;
use super::queries::FetchRecordsQuery;
use crate::api::response::ApiResponse;
use crate::error::AppError;
use crate::features::shared::LinkBase;
use crate::features::FeatureState;
use crate::ingest::UploadError;

/// Multipart field holding the uploaded file
pub const UPLOAD_FIELD: &str = "csv_file";

const FETCHED_MESSAGE: &str = "Data successfully fetched";

pub fn records_routes() -> Router<FeatureState> {
    Router::new().route("/data", post(ingest_csv).get(fetch_records))
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

/// Ingest one CSV file
///
/// # Response
///
/// - `201 Created` - `{status, data: {csvLinesRead, totalSavedRows}}`
/// - `400 Bad Request` - unreadable form, not a `.csv` file or wrong header
/// - `500 Internal Server Error` - any failure during ingestion, nothing stored
#[tracing::instrument(skip_all)]
async fn ingest_csv(
    State(state): State<FeatureState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let command = read_upload(multipart).await?;
    let response = super::commands::ingest_csv::handle(&state.ingest, command).await?;

    tracing::info!(
        lines_read = %response.csv_lines_read,
        rows_saved = %response.total_saved_rows,
        "CSV ingested via API"
    );

    Ok(ApiResponse::created(response).into_response())
}

async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<IngestCsvCommand, UploadError> {
    let mut multipart = multipart.map_err(|e| UploadError::Unreadable(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Unreadable(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content = field
            .bytes()
            .await
            .map_err(|e| UploadError::Unreadable(e.body_text()))?;

        return Ok(IngestCsvCommand { filename, content });
    }

    Err(UploadError::MissingField(UPLOAD_FIELD))
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

/// Page through stored records
///
/// Query parameters: `limit` (default 100), `page` (default 1), `search`
/// (PostgreSQL only) and `ptype=full` for the pagination block.
#[tracing::instrument(skip_all, fields(uri = %uri))]
async fn fetch_records(
    State(state): State<FeatureState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    // Duplicate or odd parameters fall back to defaults rather than a 400.
    let query = Query::<FetchRecordsQuery>::try_from_uri(&uri)
        .map(|Query(query)| query)
        .unwrap_or_default();

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");
    let base = LinkBase::from_request(host, uri.path(), uri.query());

    let response = super::queries::fetch::handle(state.store.clone(), query, base).await?;

    tracing::debug!(count = response.data.len(), "Records listed via API");

    Ok(ApiResponse::success(response.data)
        .with_message(FETCHED_MESSAGE)
        .with_pagination(response.pagination)
        .into_response())
}
