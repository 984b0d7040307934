//! Page planning for list queries
//!
//! [`plan`] turns a requested page, a page size and the total number of
//! matching rows into a [`PageInfo`]: page counts plus ready-made links to the
//! current, previous, next and last pages.
//!
//! # Examples
//!
//! ```rust,ignore
//! use candlestore_server::features::shared::pagination::{plan, LinkBase, PageSpec};
//!
//! let base = LinkBase::from_request("localhost:8000", "/data", Some("search=btc&page=2"));
//! let info = plan(PageSpec::new(2, 10), 25, &base)?;
//! assert_eq!(info.next_page, Some(3));
//! ```

use serde::Serialize;
use thiserror::Error;
use url::form_urlencoded;

/// Page size when `limit` is missing or unusable
pub const DEFAULT_LIMIT: u64 = 100;

/// A requested page, both fields at least 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub page: u64,
    pub limit: u64,
}

impl PageSpec {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: if limit == 0 { DEFAULT_LIMIT } else { limit },
        }
    }

    /// Read raw `page` and `limit` query values
    ///
    /// A missing or unparseable page is 1; a missing, unparseable or zero
    /// limit is [`DEFAULT_LIMIT`].
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .map_or(1, |p| u64::try_from(p).unwrap_or(0));
        let limit = limit
            .and_then(|l| l.trim().parse::<i64>().ok())
            .map_or(DEFAULT_LIMIT, |l| u64::try_from(l).unwrap_or(0));
        Self::new(page, limit)
    }

    /// Rows to skip before this page
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// The request URL that page links are built from
///
/// `page` and `limit` are dropped from the query; other parameters keep their
/// original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBase {
    pub scheme: &'static str,
    pub host: String,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl LinkBase {
    pub fn from_request(host: &str, path: &str, query: Option<&str>) -> Self {
        let query = query
            .map(|q| {
                form_urlencoded::parse(q.as_bytes())
                    .filter(|(key, _)| key != "page" && key != "limit")
                    .map(|(key, value)| (key.into_owned(), value.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            scheme: scheme_for(host),
            host: host.to_string(),
            path: path.to_string(),
            query,
        }
    }

    /// Link to `page` with `limit` rows per page
    pub fn link(&self, page: u64, limit: u64) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.query)
            .append_pair("page", &page.to_string())
            .append_pair("limit", &limit.to_string())
            .finish();
        format!("{}://{}{}?{}", self.scheme, self.host, self.path, query)
    }
}

/// Local hosts are linked over plain HTTP, everything else over HTTPS.
fn scheme_for(host: &str) -> &'static str {
    if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    }
}

/// Pagination block of a list response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub current_page_url: String,
    pub current_page: u64,
    pub total_pages: u64,
    pub per_page: u64,
    pub limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<u64>,
    /// Rows on this page
    pub current_page_total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_page_url: Option<String>,
    pub total: u64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaginationError {
    /// The page starts past the last row
    #[error("Invalid paginator params")]
    InvalidPage { page: u64, limit: u64, total: u64 },
}

/// Plan `spec` over `total` rows
pub fn plan(spec: PageSpec, total: u64, base: &LinkBase) -> Result<PageInfo, PaginationError> {
    let spec = PageSpec::new(spec.page, spec.limit);
    let PageSpec { page, limit } = spec;
    let offset = spec.offset();

    if offset > total {
        return Err(PaginationError::InvalidPage { page, limit, total });
    }

    let total_pages = total.div_ceil(limit);
    let current_page_total = if page.saturating_mul(limit) > total {
        total - offset
    } else {
        limit
    };

    let previous_page = (page > 1).then(|| page - 1);
    let next_page = (page < total_pages).then(|| page + 1);

    Ok(PageInfo {
        current_page_url: base.link(page, limit),
        current_page: page,
        total_pages,
        per_page: limit,
        limit,
        previous_page,
        next_page,
        current_page_total,
        previous_page_url: previous_page.map(|p| base.link(p, limit)),
        next_page_url: next_page.map(|p| base.link(p, limit)),
        last_page_url: next_page.map(|_| base.link(total_pages, limit)),
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> LinkBase {
        LinkBase::from_request("localhost:8000", "/data", None)
    }

    #[test]
    fn test_first_page() {
        let info = plan(PageSpec::new(1, 10), 25, &local()).unwrap();

        assert_eq!(info.total_pages, 3);
        assert_eq!(info.current_page_total, 10);
        assert_eq!(info.next_page, Some(2));
        assert_eq!(info.previous_page, None);
        assert_eq!(info.previous_page_url, None);
        assert_eq!(
            info.next_page_url.as_deref(),
            Some("http://localhost:8000/data?page=2&limit=10")
        );
        assert_eq!(
            info.last_page_url.as_deref(),
            Some("http://localhost:8000/data?page=3&limit=10")
        );
    }

    #[test]
    fn test_last_page_is_short() {
        let info = plan(PageSpec::new(3, 10), 25, &local()).unwrap();

        assert_eq!(info.current_page_total, 5);
        assert_eq!(info.previous_page, Some(2));
        assert_eq!(info.next_page, None);
        assert_eq!(info.next_page_url, None);
        assert_eq!(info.last_page_url, None);
    }

    #[test]
    fn test_page_past_end_is_invalid() {
        let err = plan(PageSpec::new(10, 10), 25, &local()).unwrap_err();
        assert_eq!(err, PaginationError::InvalidPage { page: 10, limit: 10, total: 25 });
        assert_eq!(err.to_string(), "Invalid paginator params");
    }

    #[test]
    fn test_page_just_past_full_last_page_is_allowed() {
        // (page - 1) * limit == total is still accepted, with an empty page.
        let info = plan(PageSpec::new(4, 10), 30, &local()).unwrap();
        assert_eq!(info.current_page_total, 0);
        assert_eq!(info.next_page, None);
    }

    #[test]
    fn test_empty_table() {
        let info = plan(PageSpec::new(1, 100), 0, &local()).unwrap();
        assert_eq!(info.total_pages, 0);
        assert_eq!(info.current_page_total, 0);
        assert_eq!(info.next_page, None);
    }

    #[test]
    fn test_links_keep_other_params_in_order() {
        let base = LinkBase::from_request(
            "api.example.com",
            "/data",
            Some("search=btc&page=2&ptype=full&limit=5"),
        );
        assert_eq!(base.scheme, "https");
        assert_eq!(
            base.link(3, 5),
            "https://api.example.com/data?search=btc&ptype=full&page=3&limit=5"
        );
    }

    #[test]
    fn test_loopback_host_uses_http() {
        let base = LinkBase::from_request("127.0.0.1:8000", "/data", Some("limit=1"));
        assert_eq!(base.link(1, 1), "http://127.0.0.1:8000/data?page=1&limit=1");
    }

    #[test]
    fn test_page_spec_from_query() {
        assert_eq!(PageSpec::from_query(None, None), PageSpec { page: 1, limit: 100 });
        assert_eq!(PageSpec::from_query(Some(" 3 "), Some("20")), PageSpec { page: 3, limit: 20 });
        assert_eq!(PageSpec::from_query(Some("-4"), Some("0")), PageSpec { page: 1, limit: 100 });
        assert_eq!(PageSpec::from_query(Some("x"), Some("-5")), PageSpec { page: 1, limit: 100 });
    }

    #[test]
    fn test_offset() {
        assert_eq!(PageSpec::new(1, 10).offset(), 0);
        assert_eq!(PageSpec::new(3, 10).offset(), 20);
    }
}
