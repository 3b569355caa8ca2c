//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outgoing response:
//!     → headers.rs (HSTS unless the handler set its own)
//! ```

pub mod headers;

pub use headers::{hsts_layer, HSTS_POLICY};
