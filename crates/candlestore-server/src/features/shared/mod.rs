//! Shared utilities and types for feature modules
//!
//! # Contents
//!
//! - **pagination**: page planning and page links for list queries

pub mod pagination;

pub use pagination::{plan, LinkBase, PageInfo, PageSpec, PaginationError};
