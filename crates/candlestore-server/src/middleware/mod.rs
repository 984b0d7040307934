//! Middleware for the candlestore server
//!
//! This module provides middleware for:
//! - CORS (Cross-Origin Resource Sharing)
//! - Request logging with tracing
//! - Request timeouts

use axum::http::{header, Method, StatusCode};
use std::time::Duration;
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::CorsConfig;

/// How long browsers may cache a preflight response
pub const CORS_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

/// Create CORS layer from configuration
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::PUT,
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::PATCH,
        ])
        .max_age(CORS_MAX_AGE);

    let wildcard =
        config.allowed_origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*");

    if wildcard {
        // Credentials cannot be combined with a wildcard origin, so the
        // request origin is mirrored instead.
        if config.allow_credentials {
            cors.allow_origin(AllowOrigin::mirror_request())
                .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::CONTENT_LENGTH])
                .expose_headers([header::CONTENT_LENGTH])
                .allow_credentials(true)
        } else {
            cors.allow_origin(Any).allow_headers(Any)
        }
    } else {
        let origins: Vec<_> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        cors.allow_origin(origins)
            .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::CONTENT_LENGTH])
            .expose_headers([header::CONTENT_LENGTH])
            .allow_credentials(config.allow_credentials)
    }
}

/// Create tracing/logging layer
pub fn tracing_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(tower_http::LatencyUnit::Micros),
        )
}

/// Fail requests that run longer than `secs` with 408
///
/// Keep `secs` above the ingest deadline so uploads fail through the
/// coordinator first.
pub fn timeout_layer(secs: u64) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(secs))
}
