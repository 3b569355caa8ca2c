//! Service bootstrap library.
//!
//! Assembles an HTTP service in a fixed order: integrity checks, the request
//! pipeline, late-bound business routes, the listener, readiness
//! notification and a signal-driven graceful shutdown.

pub mod config;
pub mod http;
pub mod integrity;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod security;

pub use config::AppConfig;
pub use http::{Envelope, HttpServer};
pub use lifecycle::{Application, ShutdownCoordinator};
pub use pipeline::{PipelineBuilder, Stage};
