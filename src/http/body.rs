//! Request body parsing stage.
//!
//! JSON, URL-encoded and multipart bodies are buffered up to their configured
//! limit and the parsed form is attached to the request as a [`ParsedBody`].
//! Other content types pass through untouched.

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, FromRequestParts, Multipart, Request, State},
    http::{header, request::Parts, Extensions, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use crate::config::BodyLimits;
use crate::http::error::RequestError;

/// The body as seen by the parsing stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    /// Recognised content type with a zero-length body.
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
    /// Multipart form fields and files, in payload order.
    Multipart(Vec<FormPart>),
    /// Content type the stage does not parse; the body is still in the request.
    Unparsed,
}

impl ParsedBody {
    /// Look up a URL-encoded field.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        match self {
            ParsedBody::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            ParsedBody::Multipart(parts) => parts
                .iter()
                .find(|p| p.name == key && p.file_name.is_none())
                .and_then(|p| std::str::from_utf8(&p.data).ok()),
            _ => None,
        }
    }

    /// Multipart parts that carry a file name.
    pub fn files(&self) -> impl Iterator<Item = &FormPart> {
        let parts = match self {
            ParsedBody::Multipart(parts) => parts.as_slice(),
            _ => &[],
        };
        parts.iter().filter(|p| p.file_name.is_some())
    }
}

/// One part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    /// Set for file uploads.
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl<S> FromRequestParts<S> for ParsedBody
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ParsedBody>()
            .cloned()
            .unwrap_or(ParsedBody::Unparsed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Multipart,
}

impl BodyKind {
    fn of(headers: &HeaderMap) -> Option<Self> {
        let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/json" => Some(BodyKind::Json),
            "application/x-www-form-urlencoded" => Some(BodyKind::Form),
            "multipart/form-data" => Some(BodyKind::Multipart),
            other if other.starts_with("application/") && other.ends_with("+json") => {
                Some(BodyKind::Json)
            }
            _ => None,
        }
    }

    fn limit(self, limits: &BodyLimits) -> usize {
        match self {
            BodyKind::Json => limits.json_bytes,
            BodyKind::Form => limits.urlencoded_bytes,
            BodyKind::Multipart => limits.multipart_bytes,
        }
    }

    async fn parse(
        self,
        headers: &HeaderMap,
        extensions: &Extensions,
        bytes: &Bytes,
    ) -> Result<ParsedBody, RequestError> {
        if bytes.is_empty() {
            return Ok(ParsedBody::Empty);
        }
        match self {
            BodyKind::Json => serde_json::from_slice(bytes)
                .map(ParsedBody::Json)
                .map_err(|e| RequestError::MalformedBody {
                    kind: "json",
                    reason: e.to_string(),
                }),
            BodyKind::Form => Ok(ParsedBody::Form(
                url::form_urlencoded::parse(bytes).into_owned().collect(),
            )),
            BodyKind::Multipart => parse_multipart(headers, extensions, bytes)
                .await
                .map(ParsedBody::Multipart),
        }
    }
}

fn malformed_multipart(reason: impl ToString) -> RequestError {
    RequestError::MalformedBody {
        kind: "multipart",
        reason: reason.to_string(),
    }
}

async fn parse_multipart(
    headers: &HeaderMap,
    extensions: &Extensions,
    bytes: &Bytes,
) -> Result<Vec<FormPart>, RequestError> {
    let mut request = Request::new(Body::from(bytes.clone()));
    *request.headers_mut() = headers.clone();
    // Carries the stage's body limit through to the multipart reader.
    *request.extensions_mut() = extensions.clone();

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| malformed_multipart(rejection.body_text()))?;

    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(malformed_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(malformed_multipart)?;
        parts.push(FormPart {
            name,
            file_name,
            content_type,
            data,
        });
    }
    Ok(parts)
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Body parsing stage.
pub async fn parse_body(
    State(limits): State<BodyLimits>,
    request: Request,
    next: Next,
) -> Result<Response, RequestError> {
    let Some(kind) = BodyKind::of(request.headers()) else {
        return Ok(next.run(request).await);
    };

    let limit = kind.limit(&limits);
    if content_length(request.headers()).is_some_and(|len| len > limit) {
        return Err(RequestError::PayloadTooLarge { limit });
    }

    let (mut parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| RequestError::PayloadTooLarge { limit })?;

    let parsed = kind.parse(&parts.headers, &parts.extensions, &bytes).await?;
    parts.extensions.insert(parsed);

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
