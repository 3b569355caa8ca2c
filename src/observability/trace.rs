//! Distributed trace propagation.
//!
//! # Responsibilities
//! - Extract W3C trace context (`traceparent`) from incoming requests
//! - Start a new trace when none (or an invalid one) is present
//! - Run the request inside a span carrying the trace ids
//! - Echo the context back on the response

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use tracing::Instrument;

use crate::config::ObservabilityConfig;

pub const TRACEPARENT: &str = "traceparent";

/// Trace identity of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// 32 lowercase hex digits.
    pub trace_id: String,
    /// 16 lowercase hex digits, fresh for this hop.
    pub span_id: String,
    /// Span id of the caller, when the trace was continued.
    pub parent_id: Option<String>,
    pub sampled: bool,
}

impl TraceContext {
    /// Continue the caller's trace or start a new one.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(TRACEPARENT)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::continue_from)
            .unwrap_or_else(Self::start)
    }

    /// Start a new sampled trace.
    pub fn start() -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().simple().to_string(),
            span_id: new_span_id(),
            parent_id: None,
            sampled: true,
        }
    }

    /// Parse a `traceparent` value and open a child span of it.
    pub fn continue_from(traceparent: &str) -> Option<Self> {
        let mut fields = traceparent.trim().split('-');
        let version = fields.next()?;
        let trace_id = fields.next()?;
        let parent_id = fields.next()?;
        let flags = fields.next()?;

        if !is_hex(version, 2) || version == "ff" {
            return None;
        }
        // Version 00 has exactly four fields.
        if version == "00" && fields.next().is_some() {
            return None;
        }
        if !is_hex(trace_id, 32) || is_zero(trace_id) {
            return None;
        }
        if !is_hex(parent_id, 16) || is_zero(parent_id) {
            return None;
        }
        if !is_hex(flags, 2) {
            return None;
        }
        let flags = u8::from_str_radix(flags, 16).ok()?;

        Some(Self {
            trace_id: trace_id.to_string(),
            span_id: new_span_id(),
            parent_id: Some(parent_id.to_string()),
            sampled: flags & 0x01 == 0x01,
        })
    }

    /// The `traceparent` value naming this hop as parent.
    pub fn header_value(&self) -> String {
        format!(
            "00-{}-{}-{}",
            self.trace_id,
            self.span_id,
            if self.sampled { "01" } else { "00" }
        )
    }

    /// Extract the trace id from a `traceparent` value.
    pub fn trace_id_of(traceparent: &str) -> Option<&str> {
        traceparent.split('-').nth(1).filter(|id| is_hex(id, 32))
    }
}

fn new_span_id() -> String {
    format!("{:016x}", rand::thread_rng().gen_range(1..=u64::MAX))
}

fn is_hex(field: &str, len: usize) -> bool {
    field.len() == len
        && field
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn is_zero(field: &str) -> bool {
    field.bytes().all(|b| b == b'0')
}

/// Identity stamped on every request span.
#[derive(Debug, Clone)]
pub struct TraceSettings {
    service_name: Arc<str>,
}

impl TraceSettings {
    pub fn new(service_name: impl Into<Arc<str>>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn from_config(config: &ObservabilityConfig) -> Self {
        tracing::info!(enabled = config.apm_enabled, "APM enabled: {}", config.apm_enabled);
        if config.apm_enabled {
            tracing::info!(
                service_name = %config.service_name,
                endpoint = config.endpoint.as_deref().unwrap_or("none"),
                "APM agent configured"
            );
        }
        Self::new(config.service_name.as_str())
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

/// Trace propagation stage.
pub async fn propagate_trace(
    State(settings): State<TraceSettings>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = TraceContext::from_headers(request.headers());
    let span = tracing::info_span!(
        "request",
        service = %settings.service_name,
        trace_id = %context.trace_id,
        span_id = %context.span_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let header = HeaderValue::from_str(&context.header_value()).ok();
    request.extensions_mut().insert(context);

    let mut response = next.run(request).instrument(span).await;
    if let Some(header) = header {
        response.headers_mut().insert(TRACEPARENT, header);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Extension, Router};
    use tower::ServiceExt;

    const PARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    #[test]
    fn continues_a_valid_parent() {
        let ctx = TraceContext::continue_from(PARENT).unwrap();
        assert_eq!(ctx.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(ctx.parent_id.as_deref(), Some("00f067aa0ba902b7"));
        assert_ne!(ctx.span_id, "00f067aa0ba902b7");
        assert!(ctx.sampled);
    }

    #[test]
    fn rejects_malformed_parents() {
        for bad in [
            "",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7",
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01",
            "ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            "00-4BF92F3577B34DA6A3CE929D0E0E4736-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-extra",
        ] {
            assert!(TraceContext::continue_from(bad).is_none(), "accepted {bad:?}");
        }
    }

    #[test]
    fn new_trace_has_well_formed_header() {
        let ctx = TraceContext::start();
        let header = ctx.header_value();
        let reparsed = TraceContext::continue_from(&header).unwrap();
        assert_eq!(reparsed.trace_id, ctx.trace_id);
        assert_eq!(TraceContext::trace_id_of(&header), Some(ctx.trace_id.as_str()));
    }

    #[tokio::test]
    async fn stage_exposes_context_and_echoes_header() {
        async fn handler(Extension(ctx): Extension<TraceContext>) -> String {
            ctx.trace_id
        }

        let app = Router::new()
            .route("/", get(handler))
            .layer(middleware::from_fn_with_state(
                TraceSettings::new("orders"),
                propagate_trace,
            ));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .header(TRACEPARENT, PARENT)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let echoed = response.headers()[TRACEPARENT].to_str().unwrap().to_string();
        assert!(echoed.starts_with("00-4bf92f3577b34da6a3ce929d0e0e4736-"));

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"4bf92f3577b34da6a3ce929d0e0e4736");
    }
}
