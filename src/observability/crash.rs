//! Crash-reporting stage.
//!
//! Sits outermost in the pipeline. Panics anywhere downstream are turned into
//! a 500 and every 5xx response is handed to the configured [`CrashReporter`].

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::observability::trace::{TraceContext, TRACEPARENT};

/// A failed request, as seen by the crash reporter.
#[derive(Debug, Clone)]
pub struct CrashReport {
    pub method: Method,
    pub path: String,
    pub status: StatusCode,
    pub trace_id: Option<String>,
}

/// Sink for failed requests, e.g. an error-tracking vendor SDK.
pub trait CrashReporter: Send + Sync + 'static {
    fn capture(&self, report: &CrashReport);
}

/// Reporter that writes failures to the log.
#[derive(Debug, Clone, Default)]
pub struct LogCrashReporter;

impl CrashReporter for LogCrashReporter {
    fn capture(&self, report: &CrashReport) {
        tracing::error!(
            target: "crash",
            method = %report.method,
            path = %report.path,
            status = report.status.as_u16(),
            trace_id = report.trace_id.as_deref().unwrap_or("-"),
            "Request failed"
        );
    }
}

pub type SharedCrashReporter = Arc<dyn CrashReporter>;

/// Crash-reporting stage.
pub async fn report_failures(
    State(reporter): State<SharedCrashReporter>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    if response.status().is_server_error() {
        // The trace stage runs inside this one, its id is only on the response.
        let trace_id = response
            .headers()
            .get(TRACEPARENT)
            .and_then(|v| v.to_str().ok())
            .and_then(TraceContext::trace_id_of)
            .map(str::to_string);

        reporter.capture(&CrashReport {
            method,
            path,
            status: response.status(),
            trace_id,
        });
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use std::sync::Mutex;
    use tower::ServiceExt;
    use tower_http::catch_panic::CatchPanicLayer;

    #[derive(Default)]
    struct Recording(Mutex<Vec<CrashReport>>);

    impl CrashReporter for Recording {
        fn capture(&self, report: &CrashReport) {
            self.0.lock().unwrap().push(report.clone());
        }
    }

    async fn boom() -> &'static str {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn reports_server_errors_and_panics_only() {
        let recording = Arc::new(Recording::default());
        let reporter: SharedCrashReporter = recording.clone();

        let app = Router::new()
            .route("/ok", get(|| async { "fine" }))
            .route("/fail", get(|| async { StatusCode::BAD_GATEWAY }))
            .route("/panic", get(boom))
            .layer(CatchPanicLayer::new())
            .layer(middleware::from_fn_with_state(reporter, report_failures));

        for uri in ["/ok", "/fail", "/panic", "/missing"] {
            let _ = app
                .clone()
                .oneshot(axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
        }

        let reports = recording.0.lock().unwrap();
        let seen: Vec<_> = reports.iter().map(|r| (r.path.as_str(), r.status)).collect();
        assert_eq!(
            seen,
            vec![
                ("/fail", StatusCode::BAD_GATEWAY),
                ("/panic", StatusCode::INTERNAL_SERVER_ERROR),
            ]
        );
    }
}
