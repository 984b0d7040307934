//! Feature modules implementing the candlestore API
//!
//! Each feature is a vertical slice:
//! - `commands/` - write operations
//! - `queries/` - read operations
//! - `routes.rs` - HTTP route definitions
//!
//! # Features
//!
//! - **records**: CSV ingestion and paged reads of price records

pub mod records;
pub mod shared;

use axum::Router;
use std::sync::Arc;

use crate::config::IngestConfig;
use crate::db::RecordStore;
use crate::ingest::IngestCoordinator;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Storage backend for reads
    pub store: Arc<dyn RecordStore>,
    /// Runs uploads against the same store
    pub ingest: IngestCoordinator,
}

impl FeatureState {
    pub fn new(store: Arc<dyn RecordStore>, ingest: IngestConfig) -> Self {
        Self {
            ingest: IngestCoordinator::new(store.clone(), ingest),
            store,
        }
    }
}

/// Router with every feature route mounted
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .merge(records::records_routes())
        .with_state(state)
}
