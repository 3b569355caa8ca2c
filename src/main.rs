//! Service bootstrap binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────▶ crash report ─▶ access log ─▶ trace ─▶ metrics ─▶ envelope
//!             ─▶ body parsing ─▶ HSTS ─▶ /metrics | route table ─▶ handler
//!
//!     Startup:  integrity ─▶ pipeline ─▶ routes ─▶ listen ─▶ READY=1
//!     Shutdown: SIGTERM ─▶ grace period ─▶ close server + storage ─▶ exit
//! ```

use std::convert::Infallible;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde_json::json;

use service_bootstrap::config::{self, AppConfig, ConfigOverrides};
use service_bootstrap::http::{ActionError, Envelope};
use service_bootstrap::lifecycle::{observe_exit, Application, Resource};
use service_bootstrap::observability::logging::init_logging;
use service_bootstrap::routing::HandlerRegistry;

#[derive(Debug, Parser)]
#[command(name = "service-bootstrap", version, about = "HTTP service bootstrap")]
struct Args {
    /// TOML configuration file; defaults plus environment when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// OpenAPI document describing the business routes.
    #[arg(long)]
    routes: Option<String>,

    /// Listen address, e.g. 127.0.0.1:8080.
    #[arg(long)]
    bind: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            routes: self.routes.clone(),
            bind_address: self.bind.clone(),
        }
    }
}

fn start_logging(config: &AppConfig) {
    if let Err(e) = init_logging(&config.observability, config.server.mode) {
        eprintln!("service-bootstrap: logging already initialised: {e}");
    }
}

async fn get_status(envelope: Envelope) -> axum::response::Response {
    envelope.json_ok(&json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn get_item(
    envelope: Envelope,
    axum::extract::Path(id): axum::extract::Path<u64>,
) -> Result<axum::response::Response, ActionError<Infallible>> {
    envelope
        .action(async move { Ok::<_, Infallible>((id == 1).then(|| json!({ "id": id, "name": "first" }))) })
        .await
}

fn handlers() -> HandlerRegistry {
    HandlerRegistry::new()
        .register("getStatus", get_status)
        .register("getItem", get_item)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let loaded = match config::load(args.config.as_deref(), &args.overrides()) {
        Ok(loaded) => loaded,
        Err(e) => {
            start_logging(&AppConfig::default());
            tracing::error!(error = %e, "Invalid configuration");
            observe_exit(1, None);
            return ExitCode::FAILURE;
        }
    };

    let config = loaded.config;
    start_logging(&config);
    for warning in &loaded.warnings {
        tracing::warn!("{warning}");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %config.server.mode,
        routes = %config.routes.spec_path,
        "service-bootstrap starting"
    );

    let launched = Application::new(config)
        .handlers(handlers())
        .storage(Resource::noop("storage"))
        .launch()
        .await;

    match launched {
        Ok(running) => {
            let outcome = running.wait().await;
            ExitCode::from(outcome.code() as u8)
        }
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            observe_exit(1, None);
            ExitCode::FAILURE
        }
    }
}
