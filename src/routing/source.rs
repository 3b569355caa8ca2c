//! External route sources.
//!
//! A [`RouteSource`] produces the business routes asynchronously. The
//! [`OpenApiSource`] reads a Swagger 2.0 / OpenAPI JSON document and binds
//! each operation's `operationId` to a handler from a [`HandlerRegistry`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use axum::{
    handler::Handler,
    routing::{MethodFilter, MethodRouter},
    BoxError, Router,
};
use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Failure to load or mount the external route table.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("failed to read route source {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse route source {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid route path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("operation {method} {path} has no operationId")]
    MissingOperationId { method: String, path: String },

    #[error("no handler registered for operation '{0}'")]
    UnknownOperation(String),

    #[error("route source defines no operations")]
    Empty,

    #[error("route source failed: {0}")]
    Source(BoxError),
}

/// Asynchronous provider of the business routes.
pub trait RouteSource: Send + Sync {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    fn load(&self) -> BoxFuture<'_, Result<Router, RegistrationError>>;
}

type BindHandler = Box<dyn Fn(MethodFilter) -> MethodRouter + Send + Sync>;

/// Handlers addressable by operation id.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, BindHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `operation_id`.
    pub fn register<H, T>(mut self, operation_id: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, ()> + Sync,
        T: 'static,
    {
        self.handlers.insert(
            operation_id.into(),
            Box::new(move |filter: MethodFilter| -> MethodRouter {
                axum::routing::on(filter, handler.clone())
            }),
        );
        self
    }

    pub fn contains(&self, operation_id: &str) -> bool {
        self.handlers.contains_key(operation_id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn bind(&self, operation_id: &str, filter: MethodFilter) -> Option<MethodRouter> {
        self.handlers.get(operation_id).map(|bind| bind(filter))
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

#[derive(Debug, Deserialize)]
struct ApiDocument {
    #[serde(default, rename = "basePath")]
    base_path: Option<String>,
    #[serde(default)]
    paths: BTreeMap<String, BTreeMap<String, Value>>,
}

fn method_filter(key: &str) -> Option<MethodFilter> {
    match key {
        "get" => Some(MethodFilter::GET),
        "post" => Some(MethodFilter::POST),
        "put" => Some(MethodFilter::PUT),
        "delete" => Some(MethodFilter::DELETE),
        "patch" => Some(MethodFilter::PATCH),
        "head" => Some(MethodFilter::HEAD),
        "options" => Some(MethodFilter::OPTIONS),
        "trace" => Some(MethodFilter::TRACE),
        // Path-level keys such as `parameters` or `summary`.
        _ => None,
    }
}

/// Check `path` against the route syntax the router accepts.
///
/// Parameters are whole segments: `{name}`, or `{*name}` as the last segment.
/// Returns the path with parameter names erased, used to detect conflicts.
fn route_shape(path: &str) -> Result<String, &'static str> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err("must start with '/'");
    };

    let segments: Vec<&str> = rest.split('/').collect();
    let mut shape = String::with_capacity(path.len());
    for (index, segment) in segments.iter().enumerate() {
        shape.push('/');
        if segment.starts_with(':') || segment.starts_with('*') {
            return Err("segments must not start with ':' or '*', use '{name}'");
        }

        let literal = segment.replace("{{", "").replace("}}", "");
        let Some(inner) = literal.strip_prefix('{') else {
            if literal.contains('{') || literal.contains('}') {
                return Err("unbalanced or embedded braces");
            }
            shape.push_str(segment);
            continue;
        };
        let Some(name) = inner.strip_suffix('}') else {
            return Err("unbalanced or embedded braces");
        };
        if name.contains('{') || name.contains('}') {
            return Err("unbalanced or embedded braces");
        }
        match name.strip_prefix('*') {
            Some("") => return Err("catch-all parameter needs a name"),
            Some(_) if index + 1 != segments.len() => {
                return Err("catch-all parameter must be the last segment")
            }
            Some(_) => shape.push_str("{*}"),
            None if name.is_empty() => return Err("parameter needs a name"),
            None => shape.push_str("{}"),
        }
    }
    Ok(shape)
}

/// Route source backed by an OpenAPI / Swagger JSON document on disk.
pub struct OpenApiSource {
    path: PathBuf,
    handlers: HandlerRegistry,
}

impl OpenApiSource {
    pub fn new(path: impl Into<PathBuf>, handlers: HandlerRegistry) -> Self {
        Self {
            path: path.into(),
            handlers,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build the router for an already-read document.
    pub fn build_router(&self, document: &[u8]) -> Result<Router, RegistrationError> {
        let document: ApiDocument =
            serde_json::from_slice(document).map_err(|source| RegistrationError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let base = document
            .base_path
            .as_deref()
            .unwrap_or_default()
            .trim_end_matches('/');

        let mut router = Router::new();
        let mut operations = 0usize;
        let mut shapes = HashSet::new();

        for (path, item) in &document.paths {
            let full = format!("{base}{path}");
            let invalid = |reason| RegistrationError::InvalidPath {
                path: full.clone(),
                reason,
            };
            if !path.starts_with('/') {
                return Err(invalid("must start with '/'"));
            }
            let shape = route_shape(&full).map_err(invalid)?;
            if !shapes.insert(shape) {
                return Err(invalid("conflicts with another path"));
            }

            let mut methods: Option<MethodRouter> = None;
            for (key, operation) in item {
                let Some(filter) = method_filter(key) else {
                    continue;
                };
                let operation_id = operation
                    .get("operationId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RegistrationError::MissingOperationId {
                        method: key.to_uppercase(),
                        path: path.clone(),
                    })?;
                let bound = self
                    .handlers
                    .bind(operation_id, filter)
                    .ok_or_else(|| RegistrationError::UnknownOperation(operation_id.to_string()))?;

                tracing::debug!(method = %key.to_uppercase(), path = %path, operation_id, "Binding operation");
                methods = Some(match methods {
                    Some(existing) => existing.merge(bound),
                    None => bound,
                });
                operations += 1;
            }

            if let Some(methods) = methods {
                router = router.route(&full, methods);
            }
        }

        if operations == 0 {
            return Err(RegistrationError::Empty);
        }
        tracing::info!(operations, base_path = %base, "Route document bound");
        Ok(router)
    }
}

impl RouteSource for OpenApiSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> BoxFuture<'_, Result<Router, RegistrationError>> {
        Box::pin(async move {
            let bytes = tokio::fs::read(&self.path)
                .await
                .map_err(|source| RegistrationError::Read {
                    path: self.path.clone(),
                    source,
                })?;
            self.build_router(&bytes)
        })
    }
}
