//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, access log stage)
//!     → metrics.rs (counters, gauges, histograms; counting stages)
//!     → trace.rs (spans with W3C trace context)
//!     → crash.rs (5xx and panic reports)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Crash reporter / APM backend
//! ```

pub mod crash;
pub mod logging;
pub mod metrics;
pub mod trace;

pub use crash::{CrashReport, CrashReporter, LogCrashReporter, SharedCrashReporter};
pub use trace::{TraceContext, TraceSettings};
