//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the logging subsystem
//! - Build the access-log stage
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format outside development, pretty format in development
//! - Log level from RUST_LOG, falling back to the configured level

use axum::Router;
use tower_http::{
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter, Layer,
};

use crate::config::{ObservabilityConfig, RuntimeMode};

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig, mode: RuntimeMode) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "service_bootstrap={level},tower_http={level},{level}",
            level = config.log_level
        ))
    });

    let format = if mode.is_development() {
        tracing_subscriber::fmt::layer().pretty().boxed()
    } else {
        tracing_subscriber::fmt::layer().json().boxed()
    };

    tracing_subscriber::registry()
        .with(format)
        .with(filter)
        .try_init()
}

/// Access-log stage.
///
/// Outside development every request is logged with its headers and
/// microsecond latency; development gets a concise line in milliseconds.
pub fn access_log(router: Router, development: bool) -> Router {
    if development {
        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
    } else {
        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(true),
                )
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(true)
                        .latency_unit(LatencyUnit::Micros),
                ),
        )
    }
}
