//! Post-dispatch observers.
//!
//! Installed once the route table is attached and run around the whole
//! pipeline, so every hook sees every completed response whatever produced it:
//! a business route, the metrics endpoint, or an early rejection such as 413.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request, State},
    http::{Method, StatusCode, Uri},
    middleware::Next,
    response::Response,
};

use super::table::RouteTable;
use crate::observability::metrics;

/// Route label used when no route template matched.
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

/// A response that has left the route handlers.
#[derive(Debug, Clone)]
pub struct CompletedRequest {
    pub method: Method,
    pub uri: Uri,
    /// Route template, e.g. `/users/{id}`, when a route matched.
    pub route: Option<String>,
    pub status: StatusCode,
    pub latency: Duration,
}

impl CompletedRequest {
    /// The route template, or [`UNMATCHED_ROUTE`].
    pub fn normalized_path(&self) -> &str {
        self.route.as_deref().unwrap_or(UNMATCHED_ROUTE)
    }
}

/// Observer called after each response.
pub trait AfterHook: Send + Sync + 'static {
    fn after(&self, completed: &CompletedRequest);
}

/// Counts responses per route template rather than per raw path.
#[derive(Debug, Clone, Default)]
pub struct RoutePathHook;

impl AfterHook for RoutePathHook {
    fn after(&self, completed: &CompletedRequest) {
        metrics::record_route_response(
            completed.normalized_path(),
            completed.method.as_str(),
            completed.status.as_u16(),
        );
    }
}

/// Writes one audit record per response under the `audit` target.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail;

impl AfterHook for AuditTrail {
    fn after(&self, completed: &CompletedRequest) {
        tracing::info!(
            target: "audit",
            method = %completed.method,
            uri = %completed.uri,
            route = completed.normalized_path(),
            status = completed.status.as_u16(),
            latency_ms = completed.latency.as_millis() as u64,
            "request completed"
        );
    }
}

/// The path-normalization and audit hooks, in that order.
#[derive(Clone)]
pub struct PostDispatch {
    hooks: Arc<[Arc<dyn AfterHook>]>,
}

impl PostDispatch {
    pub fn new(path_hook: Arc<dyn AfterHook>, audit_hook: Arc<dyn AfterHook>) -> Self {
        Self {
            hooks: Arc::from(vec![path_hook, audit_hook]),
        }
    }
}

impl Default for PostDispatch {
    fn default() -> Self {
        Self::new(Arc::new(RoutePathHook), Arc::new(AuditTrail))
    }
}

/// Route template of the attached route that answered, carried on the
/// response out of the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate(pub String);

/// Copy the matched route template onto the response.
pub async fn tag_route_template(request: Request, next: Next) -> Response {
    let template = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| RouteTemplate(p.as_str().to_string()));

    let mut response = next.run(request).await;
    if let Some(template) = template {
        response.extensions_mut().insert(template);
    }
    response
}

/// Middleware running the post-dispatch hooks installed on `table`.
pub async fn run_post_dispatch(
    State(table): State<RouteTable>,
    request: Request,
    next: Next,
) -> Response {
    let Some(post) = table.hooks() else {
        return next.run(request).await;
    };

    let method = request.method().clone();
    let uri = request.uri().clone();
    let matched = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    let route = response
        .extensions()
        .get::<RouteTemplate>()
        .map(|t| t.0.clone())
        .or(matched);
    let completed = CompletedRequest {
        method,
        uri,
        route,
        status: response.status(),
        latency: start.elapsed(),
    };
    for hook in post.hooks.iter() {
        hook.after(&completed);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct Recording(Mutex<Vec<(String, u16)>>);

    impl AfterHook for Recording {
        fn after(&self, completed: &CompletedRequest) {
            self.0
                .lock()
                .unwrap()
                .push((completed.normalized_path().to_string(), completed.status.as_u16()));
        }
    }

    #[tokio::test]
    async fn hooks_see_every_status_with_route_templates() {
        let path_hook = Arc::new(Recording::default());
        let audit_hook = Arc::new(Recording::default());
        let table = RouteTable::new();
        let app = Router::new()
            .route("/users/{id}", get(|| async { "user" }))
            .route("/boom", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .layer(middleware::from_fn(tag_route_template))
            .layer(middleware::from_fn_with_state(table.clone(), run_post_dispatch));

        app.clone()
            .oneshot(axum::http::Request::builder().uri("/users/1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(path_hook.0.lock().unwrap().is_empty());

        table.install_hooks(PostDispatch::new(path_hook.clone(), audit_hook.clone()));
        for uri in ["/users/17", "/boom", "/nope"] {
            app.clone()
                .oneshot(axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
        }

        let expected = vec![
            ("/users/{id}".to_string(), 200),
            ("/boom".to_string(), 500),
            (UNMATCHED_ROUTE.to_string(), 404),
        ];
        assert_eq!(*path_hook.0.lock().unwrap(), expected);
        assert_eq!(*audit_hook.0.lock().unwrap(), expected);
    }
}
