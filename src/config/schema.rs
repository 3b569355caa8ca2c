//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default request body limit for JSON and URL-encoded payloads (50 MB).
pub const DEFAULT_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Grace period a load balancer gets to deregister a terminating instance.
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 29;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener and runtime mode.
    pub server: ServerConfig,

    /// Optional pipeline stages.
    pub pipeline: PipelineSettings,

    /// Request body size limits.
    pub limits: BodyLimits,

    /// Logging, metrics and APM settings.
    pub observability: ObservabilityConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// External route table location.
    pub routes: RoutesConfig,
}

/// Deployment mode, selects grace period and log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    #[default]
    Development,
    Test,
    Staging,
    Production,
}

impl RuntimeMode {
    /// Only production waits out the load balancer grace period.
    pub fn is_production(self) -> bool {
        self == RuntimeMode::Production
    }

    pub fn is_development(self) -> bool {
        self == RuntimeMode::Development
    }

    /// Parse the value of an `APP_ENV`-style variable.
    pub fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(RuntimeMode::Development),
            "test" => Some(RuntimeMode::Test),
            "staging" => Some(RuntimeMode::Staging),
            "production" | "prod" => Some(RuntimeMode::Production),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeMode::Development => "development",
            RuntimeMode::Test => "test",
            RuntimeMode::Staging => "staging",
            RuntimeMode::Production => "production",
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Runtime mode.
    pub mode: RuntimeMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            mode: RuntimeMode::Development,
        }
    }
}

/// Toggles for the optional pipeline stages.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Report 5xx responses and panics to the crash reporter.
    pub crash_reporting: bool,

    /// Emit an access log line per request.
    pub access_log: bool,

    /// Also emit the legacy unlabelled request/response counters.
    pub deprecated_metrics_hooks: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            crash_reporting: false,
            access_log: true,
            deprecated_metrics_hooks: false,
        }
    }
}

/// Request body limits in bytes.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyLimits {
    pub json_bytes: usize,
    pub urlencoded_bytes: usize,
    pub multipart_bytes: usize,
}

impl BodyLimits {
    /// Largest of the configured limits; the outer guard for any body.
    pub fn max(&self) -> usize {
        self.json_bytes
            .max(self.urlencoded_bytes)
            .max(self.multipart_bytes)
    }
}

impl Default for BodyLimits {
    fn default() -> Self {
        Self {
            json_bytes: DEFAULT_BODY_LIMIT,
            urlencoded_bytes: DEFAULT_BODY_LIMIT,
            multipart_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Path of the Prometheus scrape endpoint.
    pub metrics_path: String,

    /// Service name reported in traces and crash reports.
    pub service_name: String,

    /// APM / collector endpoint.
    pub endpoint: Option<String>,

    /// Enable the APM agent.
    pub apm_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_path: "/metrics".to_string(),
            service_name: "default".to_string(),
            endpoint: None,
            apm_enabled: false,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Pause before closing resources, production mode only.
    pub grace_period_secs: u64,
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
        }
    }
}

/// Location of the external route table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Path to the OpenAPI / Swagger JSON document.
    pub spec_path: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            spec_path: "api/swagger.json".to_string(),
        }
    }
}
