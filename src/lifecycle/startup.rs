//! Startup orchestration.
//!
//! # Responsibilities
//! - Verify integrity before touching the network
//! - Build the request pipeline and attach the external routes
//! - Bind the listener, announce readiness, arm the shutdown coordinator
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Steps run strictly in order, never concurrently
//! - The listener starts last (traffic only when routes are attached)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::task::JoinHandle;

use super::readiness;
use super::shutdown::{
    grace_period_for, ExitOutcome, ProcessTerminate, Resource, ShutdownCoordinator, Terminate,
};
use super::signals::{install_signal_handlers, Signal};
use crate::config::{AppConfig, ConfigError};
use crate::http::HttpServer;
use crate::integrity::{self, IntegrityCheck, IntegrityError};
use crate::observability::{metrics::init_metrics, SharedCrashReporter};
use crate::pipeline::PipelineBuilder;
use crate::routing::{
    self, HandlerRegistry, OpenApiSource, PostDispatch, RegistrationError, RouteSource, RouteTable,
};

/// Anything that stops the service from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("integrity check failed: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("route registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error("no route source configured")]
    MissingRouteSource,

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("failed to install signal handlers: {0}")]
    Signals(std::io::Error),
}

/// Application bootstrap.
///
/// ```rust,ignore
/// let running = Application::new(config)
///     .integrity_check(check(|| verify_schema()))
///     .handlers(HandlerRegistry::new().register("getStatus", status))
///     .storage(Resource::new("database", move || pool.close()))
///     .launch()
///     .await?;
/// running.wait().await;
/// ```
pub struct Application {
    config: AppConfig,
    checks: Vec<IntegrityCheck>,
    source: Option<Box<dyn RouteSource>>,
    hooks: PostDispatch,
    crash_reporter: Option<SharedCrashReporter>,
    storage: Option<Resource>,
    terminate: Arc<dyn Terminate>,
    handle_signals: bool,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            checks: Vec::new(),
            source: None,
            hooks: PostDispatch::default(),
            crash_reporter: None,
            storage: None,
            terminate: Arc::new(ProcessTerminate),
            handle_signals: true,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Add a check run before anything else.
    pub fn integrity_check(mut self, check: IntegrityCheck) -> Self {
        self.checks.push(check);
        self
    }

    pub fn integrity_checks(mut self, checks: impl IntoIterator<Item = IntegrityCheck>) -> Self {
        self.checks.extend(checks);
        self
    }

    /// Load routes from a custom source.
    pub fn routes(mut self, source: impl RouteSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Load routes from the configured OpenAPI document, bound to `handlers`.
    pub fn handlers(self, handlers: HandlerRegistry) -> Self {
        let path = PathBuf::from(&self.config.routes.spec_path);
        self.routes(OpenApiSource::new(path, handlers))
    }

    pub fn post_dispatch(mut self, hooks: PostDispatch) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn crash_reporter(mut self, reporter: SharedCrashReporter) -> Self {
        self.crash_reporter = Some(reporter);
        self
    }

    /// The storage layer closed alongside the server at shutdown.
    pub fn storage(mut self, storage: Resource) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn terminate(mut self, terminate: Arc<dyn Terminate>) -> Self {
        self.terminate = terminate;
        self
    }

    /// Whether OS signals trigger shutdown. On by default.
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Run the startup sequence.
    pub async fn launch(self) -> Result<RunningApp, StartupError> {
        let started = Instant::now();
        let config = self.config;

        integrity::verify(self.checks)?;
        tracing::debug!("Integrity checks passed");

        let source = self.source.ok_or(StartupError::MissingRouteSource)?;

        let mut pipeline = PipelineBuilder::from_config(&config, init_metrics());
        if let Some(reporter) = self.crash_reporter {
            pipeline = pipeline.crash_reporter(reporter);
        }
        let table = RouteTable::new();
        let app = pipeline.build(table.clone());

        routing::attach(&table, source.as_ref(), self.hooks).await?;

        let address = config.server.bind_address.clone();
        let server = HttpServer::new(app)
            .bind(&address)
            .await
            .map_err(|source| StartupError::Bind { address, source })?;
        let local_addr = server.local_addr();

        tracing::info!("API running on http://localhost:{}", local_addr.port());
        tracing::info!("API running on {} mode.", config.server.mode);

        readiness::notify_ready();

        let coordinator = ShutdownCoordinator::new(
            grace_period_for(config.server.mode, &config.shutdown),
            Resource::new("http server", move || server.close()),
            self.storage.unwrap_or_else(|| Resource::noop("storage")),
            self.terminate,
        );

        let signals = if self.handle_signals {
            Some(install_signal_handlers(Arc::clone(&coordinator)).map_err(StartupError::Signals)?)
        } else {
            None
        };

        tracing::info!(
            address = %local_addr,
            startup_ms = started.elapsed().as_millis() as u64,
            "Startup complete"
        );

        Ok(RunningApp {
            local_addr,
            coordinator,
            signals,
        })
    }
}

/// A started service.
#[derive(Debug)]
pub struct RunningApp {
    local_addr: SocketAddr,
    coordinator: Arc<ShutdownCoordinator>,
    signals: Option<JoinHandle<()>>,
}

impl RunningApp {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.coordinator
    }

    /// Shut down as if `signal` had been delivered.
    pub async fn shutdown(&self, signal: Signal) -> Option<ExitOutcome> {
        self.coordinator.shutdown(signal).await
    }

    /// Wait until the shutdown sequence has run.
    pub async fn wait(self) -> ExitOutcome {
        let outcome = self.coordinator.wait_terminated().await;
        if let Some(signals) = self.signals {
            signals.abort();
        }
        outcome
    }
}
