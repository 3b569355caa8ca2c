//! Request-scoped errors raised by the pipeline itself.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors the pipeline stages can answer a request with.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RequestError {
    /// A handler asked for the envelope but the envelope stage never ran.
    #[error("response envelope is not installed")]
    EnvelopeMissing,

    /// An action resolved to nothing.
    #[error("resource not found")]
    NotFound,

    /// The request body is larger than the configured limit.
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The body does not parse as its declared content type.
    #[error("malformed {kind} body: {reason}")]
    MalformedBody { kind: &'static str, reason: String },

    /// The external route table has not been attached yet.
    #[error("routes are not attached yet")]
    RoutesUnavailable,

    /// A payload could not be serialized.
    #[error("failed to serialize response: {0}")]
    Serialization(String),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::NotFound => StatusCode::NOT_FOUND,
            RequestError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RequestError::MalformedBody { .. } => StatusCode::BAD_REQUEST,
            RequestError::RoutesUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            RequestError::EnvelopeMissing | RequestError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            RequestError::NotFound => "NotFound",
            RequestError::PayloadTooLarge { .. } => "PayloadTooLarge",
            RequestError::MalformedBody { .. } => "BadRequest",
            RequestError::RoutesUnavailable => "ServiceUnavailable",
            RequestError::EnvelopeMissing | RequestError::Serialization(_) => "Internal",
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "code": self.code(), "message": self.to_string() }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_correctly() {
        assert_eq!(RequestError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            RequestError::PayloadTooLarge { limit: 10 }.into_response().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            RequestError::EnvelopeMissing.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn display_includes_reason() {
        let err = RequestError::MalformedBody {
            kind: "json",
            reason: "expected value".into(),
        };
        assert_eq!(err.to_string(), "malformed json body: expected value");
    }
}
