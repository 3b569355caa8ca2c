//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGINT and SIGTERM
//! - Hand every delivery to the [`ShutdownCoordinator`]
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Each delivery runs on its own task so a draining shutdown never delays
//!   the next signal; the coordinator decides which one counts

use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::task::JoinHandle;

use super::shutdown::ShutdownCoordinator;

/// Termination signals the service reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Interrupt => f.write_str("SIGINT"),
            Signal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

fn dispatch(coordinator: &Arc<ShutdownCoordinator>, signal: Signal) {
    tracing::debug!(%signal, "Signal received");
    let coordinator = Arc::clone(coordinator);
    tokio::spawn(async move {
        coordinator.shutdown(signal).await;
    });
}

/// Start listening for termination signals.
#[cfg(unix)]
pub fn install_signal_handlers(
    coordinator: Arc<ShutdownCoordinator>,
) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = interrupt.recv() => Signal::Interrupt,
                Some(()) = terminate.recv() => Signal::Terminate,
                else => break,
            };
            dispatch(&coordinator, received);
        }
    }))
}

/// Start listening for Ctrl-C.
#[cfg(not(unix))]
pub fn install_signal_handlers(
    coordinator: Arc<ShutdownCoordinator>,
) -> io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            dispatch(&coordinator, Signal::Interrupt);
        }
    }))
}
