//! Pipeline assembly.
//!
//! Stages are applied innermost first so that each `layer` call wraps the
//! previous ones; the resulting request order is [`Stage::ALL`] order. The
//! route table's post-dispatch hooks wrap the finished pipeline.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::header,
    middleware,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer};

use super::stage::Stage;
use crate::config::{AppConfig, BodyLimits};
use crate::http::{body::parse_body, envelope::install_envelope};
use crate::observability::{
    crash::report_failures,
    logging::access_log,
    metrics::{count_requests, count_responses, MetricsHooks},
    trace::propagate_trace,
    LogCrashReporter, SharedCrashReporter, TraceSettings,
};
use crate::routing::{hooks::run_post_dispatch, RouteTable};
use crate::security::hsts_layer;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Which optional stages run, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub enable_crash_reporting: bool,
    pub enable_access_log: bool,
    /// Selects the concise access log format.
    pub is_development: bool,
    pub enable_distributed_trace: bool,
    pub enable_deprecated_metrics_hooks: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_crash_reporting: false,
            enable_access_log: true,
            is_development: true,
            enable_distributed_trace: true,
            enable_deprecated_metrics_hooks: false,
        }
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            enable_crash_reporting: config.pipeline.crash_reporting,
            enable_access_log: config.pipeline.access_log,
            is_development: config.server.mode.is_development(),
            enable_distributed_trace: true,
            enable_deprecated_metrics_hooks: config.pipeline.deprecated_metrics_hooks,
        }
    }
}

/// Builds the fixed request pipeline in front of a [`RouteTable`].
pub struct PipelineBuilder {
    config: PipelineConfig,
    limits: BodyLimits,
    trace: TraceSettings,
    crash_reporter: SharedCrashReporter,
    metrics: PrometheusHandle,
    metrics_path: String,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig, metrics: PrometheusHandle) -> Self {
        Self {
            config,
            limits: BodyLimits::default(),
            trace: TraceSettings::new("default"),
            crash_reporter: Arc::new(LogCrashReporter),
            metrics,
            metrics_path: "/metrics".to_string(),
        }
    }

    /// Builder seeded from the application config.
    pub fn from_config(config: &AppConfig, metrics: PrometheusHandle) -> Self {
        Self::new(PipelineConfig::from(config), metrics)
            .limits(config.limits)
            .trace_settings(TraceSettings::from_config(&config.observability))
            .metrics_path(config.observability.metrics_path.clone())
    }

    pub fn limits(mut self, limits: BodyLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn trace_settings(mut self, trace: TraceSettings) -> Self {
        self.trace = trace;
        self
    }

    pub fn crash_reporter(mut self, reporter: SharedCrashReporter) -> Self {
        self.crash_reporter = reporter;
        self
    }

    pub fn metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = path.into();
        self
    }

    /// The stages this configuration runs, outermost first.
    pub fn stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|stage| match stage {
                Stage::CrashReporting => self.config.enable_crash_reporting,
                Stage::AccessLog => self.config.enable_access_log,
                Stage::TracePropagation => self.config.enable_distributed_trace,
                _ => true,
            })
            .collect()
    }

    /// Assemble the pipeline. Requests no stage answers fall through to `table`.
    pub fn build(self, table: RouteTable) -> Router {
        let stages = self.stages();
        tracing::debug!(
            stages = %stages.iter().map(|s| s.name()).collect::<Vec<_>>().join(","),
            "Building request pipeline"
        );

        let dispatch_table = table.clone();
        let mut router = Router::new().fallback(move |request: Request| {
            let table = dispatch_table.clone();
            async move { table.dispatch(request).await }
        });

        for stage in stages.into_iter().rev() {
            router = self.apply(stage, router);
        }
        router.layer(middleware::from_fn_with_state(table, run_post_dispatch))
    }

    fn apply(&self, stage: Stage, router: Router) -> Router {
        let hooks = MetricsHooks {
            legacy_counters: self.config.enable_deprecated_metrics_hooks,
        };

        match stage {
            Stage::CrashReporting => router.layer(CatchPanicLayer::new()).layer(
                middleware::from_fn_with_state(self.crash_reporter.clone(), report_failures),
            ),
            Stage::AccessLog => access_log(router, self.config.is_development),
            Stage::TracePropagation => {
                router.layer(middleware::from_fn_with_state(self.trace.clone(), propagate_trace))
            }
            Stage::RequestMetrics => {
                router.layer(middleware::from_fn_with_state(hooks, count_requests))
            }
            Stage::ResponseMetrics => {
                router.layer(middleware::from_fn_with_state(hooks, count_responses))
            }
            Stage::Envelope => router.layer(middleware::from_fn(install_envelope)),
            Stage::BodyParsing => {
                let max = self.limits.max();
                router
                    .layer(middleware::from_fn_with_state(self.limits, parse_body))
                    .layer(DefaultBodyLimit::max(max))
                    .layer(RequestBodyLimitLayer::new(max))
            }
            Stage::SecurityHeaders => router.layer(hsts_layer()),
            Stage::MetricsEndpoint => {
                let handle = self.metrics.clone();
                router.route(
                    &self.metrics_path,
                    get(move || {
                        let handle = handle.clone();
                        async move { ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], handle.render()) }
                    }),
                )
            }
        }
    }
}
