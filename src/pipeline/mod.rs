//! Request pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request
//!     → crash reporting (optional)
//!     → access log (optional)
//!     → trace propagation
//!     → request metrics → response metrics
//!     → envelope
//!     → body parsing
//!     → security headers
//!     → metrics endpoint, or fallback into the route table
//! ```
//!
//! # Design Decisions
//! - The order is a fixed list of named stages; configuration only removes
//!   optional stages, it never reorders them
//! - The pipeline is assembled before business routes are known

pub mod builder;
pub mod stage;

pub use builder::{PipelineBuilder, PipelineConfig};
pub use stage::Stage;
