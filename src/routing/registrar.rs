//! Attaches the external routes to a running pipeline.

use axum::middleware;

use super::hooks::{tag_route_template, PostDispatch};
use super::source::{RegistrationError, RouteSource};
use super::table::RouteTable;

/// Load `source`, mount it on `table`, then install the post-dispatch hooks.
///
/// Nothing is mounted and no hook runs when loading fails; the table keeps
/// answering 503.
pub async fn attach(
    table: &RouteTable,
    source: &dyn RouteSource,
    hooks: PostDispatch,
) -> Result<(), RegistrationError> {
    let location = source.describe();
    tracing::debug!(source = %location, "Loading external routes");

    let routes = source.load().await.map_err(|err| {
        tracing::error!(source = %location, error = %err, "Failed to load external routes");
        err
    })?;

    table.mount(routes.layer(middleware::from_fn(tag_route_template)));
    table.install_hooks(hooks);
    tracing::info!(source = %location, "External routes attached");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::hooks::{run_post_dispatch, AfterHook, CompletedRequest};
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use futures_util::future::BoxFuture;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    struct Fixed(Option<Router>);

    impl RouteSource for Fixed {
        fn describe(&self) -> String {
            "fixed".into()
        }

        fn load(&self) -> BoxFuture<'_, Result<Router, RegistrationError>> {
            let routes = self.0.clone();
            Box::pin(async move { routes.ok_or(RegistrationError::Empty) })
        }
    }

    #[derive(Default)]
    struct Seen(Mutex<Vec<String>>);

    impl AfterHook for Seen {
        fn after(&self, completed: &CompletedRequest) {
            self.0.lock().unwrap().push(completed.normalized_path().to_string());
        }
    }

    fn request(uri: &str) -> axum::extract::Request {
        axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn attached_routes_run_post_dispatch_hooks() {
        let table = RouteTable::new();
        let seen = Arc::new(Seen::default());
        let hooks = PostDispatch::new(seen.clone(), seen.clone());
        let source = Fixed(Some(Router::new().route("/items/{id}", get(|| async { "item" }))));

        attach(&table, &source, hooks).await.unwrap();
        assert!(table.hooks().is_some());

        let dispatch_table = table.clone();
        let app = Router::new()
            .fallback(move |request: axum::extract::Request| {
                let table = dispatch_table.clone();
                async move { table.dispatch(request).await }
            })
            .layer(middleware::from_fn_with_state(table.clone(), run_post_dispatch));

        let response = app.oneshot(request("/items/3")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *seen.0.lock().unwrap(),
            vec!["/items/{id}".to_string(), "/items/{id}".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_load_leaves_table_detached() {
        let table = RouteTable::new();
        let err = attach(&table, &Fixed(None), PostDispatch::default())
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::Empty));
        assert!(!table.is_attached());
        assert!(table.hooks().is_none());
        assert_eq!(
            table.dispatch(request("/items/3")).await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
