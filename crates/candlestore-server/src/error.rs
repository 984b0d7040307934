//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::response::ErrorResponse;
use crate::features::records::queries::FetchRecordsError;
use crate::ingest::{IngestError, UploadError};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Fetch(#[from] FetchRecordsError),

    #[error("Page not found")]
    NotFound,
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        AppError::Ingest(IngestError::Upload(err))
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Ingest(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Ingest(_) | AppError::Fetch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = %message, "Request failed");
        } else {
            tracing::debug!(error = %message, status = status.as_u16(), "Request rejected");
        }

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
