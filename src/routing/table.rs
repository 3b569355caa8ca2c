//! Late-bound route table.
//!
//! The static pipeline is built before the business routes exist. Its
//! fallback dispatches into this table, which is filled in once the external
//! route source has loaded. The post-dispatch hooks live here too: they are
//! installed once the routes are attached and run around the whole pipeline.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use axum::{
    extract::Request,
    response::{IntoResponse, Response},
    Router,
};
use tower::ServiceExt;

use super::hooks::PostDispatch;
use crate::http::RequestError;

/// Shared slot holding the attached router and its post-dispatch hooks.
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: Arc<ArcSwapOption<Router>>,
    hooks: Arc<ArcSwapOption<PostDispatch>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the attached routes.
    pub fn mount(&self, router: Router) {
        self.routes.store(Some(Arc::new(router)));
    }

    pub fn is_attached(&self) -> bool {
        self.routes.load().is_some()
    }

    /// Start observing completed responses.
    pub fn install_hooks(&self, hooks: PostDispatch) {
        self.hooks.store(Some(Arc::new(hooks)));
    }

    /// The installed hooks, if any.
    pub fn hooks(&self) -> Option<Arc<PostDispatch>> {
        self.hooks.load_full()
    }

    /// Route a request through the attached table; 503 until one is mounted.
    pub async fn dispatch(&self, request: Request) -> Response {
        let Some(router) = self.routes.load_full() else {
            return RequestError::RoutesUnavailable.into_response();
        };
        match Router::clone(&router).oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("attached", &self.is_attached())
            .field("hooks", &self.hooks.load().is_some())
            .finish()
    }
}
