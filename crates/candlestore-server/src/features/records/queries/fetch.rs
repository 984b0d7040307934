use candlestore_common::PriceRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{DbError, RecordStore};
use crate::features::shared::pagination::{plan, LinkBase, PageInfo, PageSpec, PaginationError};

/// Raw query string of `GET /data`
///
/// Numbers are kept as text so that garbage falls back to defaults instead of
/// rejecting the request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchRecordsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ptype: Option<String>,
}

impl FetchRecordsQuery {
    pub fn page_spec(&self) -> PageSpec {
        PageSpec::from_query(self.page.as_deref(), self.limit.as_deref())
    }

    /// Non-empty search expression
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }

    /// `ptype=full`, in any case, asks for the pagination block
    pub fn wants_full_pagination(&self) -> bool {
        self.ptype
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case("full"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchRecordsResponse {
    pub data: Vec<PriceRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageInfo>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchRecordsError {
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Database(#[from] DbError),
}

#[tracing::instrument(skip(store, base))]
pub async fn handle(
    store: Arc<dyn RecordStore>,
    query: FetchRecordsQuery,
    base: LinkBase,
) -> Result<FetchRecordsResponse, FetchRecordsError> {
    let spec = query.page_spec();
    let search = query.search();

    if search.is_some() && !store.backend().supports_full_text_search() {
        tracing::debug!(backend = store.backend().as_str(), "Search ignored by backend");
    }

    let pagination = if query.wants_full_pagination() {
        let total = store.count(search).await?;
        Some(plan(spec, total, &base)?)
    } else {
        None
    };

    let data = store.fetch_page(search, spec.limit, spec.offset()).await?;

    Ok(FetchRecordsResponse { data, pagination })
}
