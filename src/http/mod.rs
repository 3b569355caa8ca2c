//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (bind, serve, graceful stop)
//!     → [pipeline stages]
//!     → body.rs (size-limited parsing)
//!     → envelope.rs (response helpers for handlers)
//!     → error.rs (pipeline errors rendered as JSON)
//! ```

pub mod body;
pub mod envelope;
pub mod error;
pub mod server;

pub use body::{FormPart, ParsedBody};
pub use envelope::{ActionError, Envelope};
pub use error::RequestError;
pub use server::{HttpServer, ServerHandle};
