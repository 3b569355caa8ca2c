//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Integrity checks → Build pipeline → Attach routes → Bind listener
//!     → Announce readiness (readiness.rs) → Arm shutdown
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → ShutdownCoordinator
//!
//! Shutdown (shutdown.rs):
//!     First signal → Grace period (production) → Close server + storage
//!     → Exit observer → Process exit (0 or 1)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: nothing listens until routes are attached
//! - Only the first signal starts a shutdown
//! - Shutdown failures become exit code 1

pub mod readiness;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{
    observe_exit, ExitOutcome, ProcessTerminate, Resource, ShutdownCoordinator, ShutdownState,
    TeardownError, Terminate,
};
pub use signals::Signal;
pub use startup::{Application, RunningApp, StartupError};
