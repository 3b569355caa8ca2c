//! Per-request response envelope.
//!
//! The envelope stage inserts an [`Envelope`] into every request before it
//! reaches a handler. Handlers extract it to write cache-disabled JSON or XML
//! responses, or to turn an async lookup into a response with [`Envelope::action`].

use std::fmt;
use std::future::Future;

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::http::error::RequestError;
use crate::observability::TraceContext;

pub const NO_CACHE: &str = "no-cache, no-store, must-revalidate";
pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_XML: &str = "application/xml";

/// Response-writing helpers scoped to a single request.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    trace: Option<TraceContext>,
}

impl Envelope {
    pub(crate) fn new(trace: Option<TraceContext>) -> Self {
        Self { trace }
    }

    /// Trace identity of the request, when trace propagation ran.
    pub fn trace(&self) -> Option<&TraceContext> {
        self.trace.as_ref()
    }

    /// Serialize `payload` as a cache-disabled JSON response.
    pub fn json<T>(&self, payload: &T, status: StatusCode) -> Response
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_vec(payload) {
            Ok(bytes) => write(status, APPLICATION_JSON, Body::from(bytes)),
            Err(e) => RequestError::Serialization(e.to_string()).into_response(),
        }
    }

    /// `json` with `200 OK`.
    pub fn json_ok<T>(&self, payload: &T) -> Response
    where
        T: Serialize + ?Sized,
    {
        self.json(payload, StatusCode::OK)
    }

    /// Write `payload` unmodified as a cache-disabled XML response.
    pub fn xml(&self, payload: impl Into<Body>, status: StatusCode) -> Response {
        write(status, APPLICATION_XML, payload.into())
    }

    pub fn xml_ok(&self, payload: impl Into<Body>) -> Response {
        self.xml(payload, StatusCode::OK)
    }

    /// Resolve an async lookup into a response.
    ///
    /// `Ok(Some(v))` is written with [`Envelope::json_ok`], `Ok(None)` becomes
    /// [`ActionError::NotFound`] and `Err(e)` is forwarded untouched as
    /// [`ActionError::Handler`].
    pub async fn action<T, E, Fut>(&self, operation: Fut) -> Result<Response, ActionError<E>>
    where
        Fut: Future<Output = Result<Option<T>, E>>,
        T: Serialize,
    {
        match operation.await {
            Ok(Some(value)) => Ok(self.json_ok(&value)),
            Ok(None) => Err(ActionError::NotFound),
            Err(e) => Err(ActionError::Handler(e)),
        }
    }
}

fn write(status: StatusCode, content_type: &'static str, body: Body) -> Response {
    (
        status,
        [
            (header::CACHE_CONTROL, NO_CACHE),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
            (header::CONTENT_TYPE, content_type),
        ],
        body,
    )
        .into_response()
}

/// The error channel of [`Envelope::action`].
#[derive(Debug)]
pub enum ActionError<E> {
    /// The operation resolved to nothing.
    NotFound,
    /// The operation failed; the handler's error, unchanged.
    Handler(E),
}

impl<E: fmt::Display> fmt::Display for ActionError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::NotFound => f.write_str("resource not found"),
            ActionError::Handler(e) => e.fmt(f),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ActionError<E> {}

impl<E: IntoResponse> IntoResponse for ActionError<E> {
    fn into_response(self) -> Response {
        match self {
            ActionError::NotFound => RequestError::NotFound.into_response(),
            ActionError::Handler(e) => e.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for Envelope
where
    S: Send + Sync,
{
    type Rejection = RequestError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Envelope>()
            .cloned()
            .ok_or(RequestError::EnvelopeMissing)
    }
}

/// Envelope stage: attach a fresh envelope to the request.
pub async fn install_envelope(mut request: Request, next: Next) -> Response {
    let trace = request.extensions().get::<TraceContext>().cloned();
    request.extensions_mut().insert(Envelope::new(trace));
    next.run(request).await
}
