//! Shutdown coordination for the service.
//!
//! # Responsibilities
//! - Accept the first termination signal, ignore the rest
//! - Wait out the load balancer grace period in production
//! - Close the HTTP server and the storage layer concurrently
//! - Report the exit code and end the process
//!
//! # Design Decisions
//! - State moves `Running → Draining → ClosingResources → Terminated`, never back
//! - Teardown failures are logged and turned into exit code 1, never propagated
//! - Process termination is injected so tests can observe it

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::BoxError;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use super::signals::Signal;
use crate::config::{RuntimeMode, ShutdownConfig};

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShutdownState {
    Running = 0,
    Draining = 1,
    ClosingResources = 2,
    Terminated = 3,
}

impl ShutdownState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ShutdownState::Running,
            1 => ShutdownState::Draining,
            2 => ShutdownState::ClosingResources,
            _ => ShutdownState::Terminated,
        }
    }
}

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    Failure,
}

impl ExitOutcome {
    pub fn code(self) -> i32 {
        match self {
            ExitOutcome::Success => 0,
            ExitOutcome::Failure => 1,
        }
    }
}

/// A resource failed to close.
#[derive(Debug, Error)]
#[error("failed to close {resource}: {source}")]
pub struct TeardownError {
    pub resource: String,
    #[source]
    pub source: BoxError,
}

type Closer = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// Something closed once during teardown.
pub struct Resource {
    name: String,
    close: Closer,
}

impl Resource {
    pub fn new<F, Fut, E>(name: impl Into<String>, close: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            name: name.into(),
            close: Box::new(move || {
                let closing = close();
                Box::pin(async move { closing.await.map_err(Into::into) })
            }),
        }
    }

    /// A resource with nothing to release.
    pub fn noop(name: impl Into<String>) -> Self {
        Self::new(name, || async { Ok::<(), BoxError>(()) })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn close(self) -> Result<(), TeardownError> {
        tracing::debug!(resource = %self.name, "Closing resource");
        (self.close)().await.map_err(|source| TeardownError {
            resource: self.name,
            source,
        })
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource").field("name", &self.name).finish()
    }
}

/// Ends the process.
pub trait Terminate: Send + Sync + 'static {
    fn terminate(&self, code: i32);
}

/// Exits the process with [`std::process::exit`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTerminate;

impl Terminate for ProcessTerminate {
    fn terminate(&self, code: i32) {
        std::process::exit(code);
    }
}

/// Exit observer: the last log line of the process.
pub fn observe_exit(code: i32, since_signal: Option<Duration>) {
    match since_signal {
        Some(elapsed) => tracing::info!(
            exit_code = code,
            elapsed_ms = elapsed.as_millis() as u64,
            "Exit {} ms after signal with code {code}",
            elapsed.as_millis()
        ),
        None => tracing::info!(exit_code = code, "Exit with code {code}"),
    }
}

/// Grace period for `mode`; only production waits.
pub fn grace_period_for(mode: RuntimeMode, config: &ShutdownConfig) -> Option<Duration> {
    mode.is_production().then(|| config.grace_period())
}

/// Single owner of the shutdown sequence.
pub struct ShutdownCoordinator {
    state: AtomicU8,
    grace_period: Option<Duration>,
    resources: Mutex<Option<(Resource, Resource)>>,
    terminate: Arc<dyn Terminate>,
    outcome: watch::Sender<Option<ExitOutcome>>,
}

impl ShutdownCoordinator {
    pub fn new(
        grace_period: Option<Duration>,
        server: Resource,
        storage: Resource,
        terminate: Arc<dyn Terminate>,
    ) -> Arc<Self> {
        let (outcome, _) = watch::channel(None);
        Arc::new(Self {
            state: AtomicU8::new(ShutdownState::Running as u8),
            grace_period,
            resources: Mutex::new(Some((server, storage))),
            terminate,
            outcome,
        })
    }

    pub fn state(&self) -> ShutdownState {
        ShutdownState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ShutdownState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Run the shutdown sequence for `signal`.
    ///
    /// Returns `None` when a shutdown is already under way.
    pub async fn shutdown(&self, signal: Signal) -> Option<ExitOutcome> {
        if self
            .state
            .compare_exchange(
                ShutdownState::Running as u8,
                ShutdownState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            tracing::info!(%signal, "Shutdown already in progress, ignoring {signal}");
            return None;
        }

        let received = Instant::now();
        tracing::info!(%signal, "Got {signal}. Graceful shutdown started");

        if let Some(grace) = self.grace_period {
            tracing::info!(
                grace_ms = grace.as_millis() as u64,
                "Waiting for load balancer to stop routing traffic"
            );
            tokio::time::sleep(grace).await;
        }

        self.set_state(ShutdownState::ClosingResources);
        let resources = self.resources.lock().await.take();
        let mut outcome = ExitOutcome::Success;
        if let Some((server, storage)) = resources {
            let (server, storage) = tokio::join!(server.close(), storage.close());
            for result in [server, storage] {
                if let Err(e) = result {
                    tracing::error!(resource = %e.resource, error = %e.source, "Teardown failed");
                    outcome = ExitOutcome::Failure;
                }
            }
        }

        let elapsed = received.elapsed();
        tracing::info!(
            elapsed_ms = elapsed.as_millis() as u64,
            "Shutdown graceful {} ms after signal",
            elapsed.as_millis()
        );

        self.set_state(ShutdownState::Terminated);
        self.outcome.send_replace(Some(outcome));
        observe_exit(outcome.code(), Some(elapsed));
        self.terminate.terminate(outcome.code());
        Some(outcome)
    }

    /// Resolves once the sequence has finished.
    pub async fn wait_terminated(&self) -> ExitOutcome {
        let mut outcome = self.outcome.subscribe();
        let resolved = match outcome.wait_for(Option::is_some).await {
            Ok(done) => (*done).unwrap_or(ExitOutcome::Failure),
            Err(_) => ExitOutcome::Failure,
        };
        resolved
    }
}

impl fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("state", &self.state())
            .field("grace_period", &self.grace_period)
            .finish()
    }
}
