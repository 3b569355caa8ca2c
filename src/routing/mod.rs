//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     source.rs (RouteSource::load, e.g. OpenAPI document + handler registry)
//!     → registrar.rs (tag route templates)
//!     → table.rs (mount into the shared slot, then install the hooks)
//!
//! Incoming Request:
//!     hooks.rs (around the whole pipeline)
//!     → pipeline stages → pipeline fallback → table.rs (dispatch)
//!     → business handler
//!     → hooks.rs (route-path metrics, audit trail)
//! ```
//!
//! # Design Decisions
//! - The pipeline is complete before any business route exists
//! - Until routes are attached, every non-pipeline request gets 503
//! - Hooks observe every response, including 404, 5xx and stage rejections

pub mod hooks;
pub mod registrar;
pub mod source;
pub mod table;

pub use hooks::{AfterHook, AuditTrail, CompletedRequest, PostDispatch, RoutePathHook};
pub use registrar::attach;
pub use source::{HandlerRegistry, OpenApiSource, RegistrationError, RouteSource};
pub use table::RouteTable;
