//! End-to-end startup and shutdown against a real listener.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{extract::Path, response::Response, Router};
use futures_util::future::BoxFuture;
use serde_json::{json, Value};

use common::{client, test_config, write_route_document, RecordingTerminate, ROUTE_DOCUMENT};
use service_bootstrap::http::{ActionError, Envelope};
use service_bootstrap::integrity::check;
use service_bootstrap::lifecycle::{
    Application, ExitOutcome, Resource, ShutdownState, Signal, StartupError,
};
use service_bootstrap::routing::{HandlerRegistry, RegistrationError, RouteSource};
use service_bootstrap::security::HSTS_POLICY;

async fn get_status(envelope: Envelope) -> Response {
    envelope.json_ok(&json!({ "status": "ok" }))
}

async fn get_item(
    envelope: Envelope,
    Path(id): Path<u64>,
) -> Result<Response, ActionError<std::convert::Infallible>> {
    envelope
        .action(async move { Ok::<_, std::convert::Infallible>((id == 7).then(|| json!({ "id": id }))) })
        .await
}

fn handlers() -> HandlerRegistry {
    HandlerRegistry::new()
        .register("getStatus", get_status)
        .register("getItem", get_item)
}

fn counting_storage(closed: &Arc<AtomicUsize>) -> Resource {
    let closed = Arc::clone(closed);
    Resource::new("storage", move || async move {
        closed.fetch_add(1, Ordering::SeqCst);
        Ok::<(), std::io::Error>(())
    })
}

#[tokio::test]
async fn serves_routes_then_shuts_down_cleanly() {
    let document = write_route_document(ROUTE_DOCUMENT);
    let terminate = RecordingTerminate::new();
    let closed = Arc::new(AtomicUsize::new(0));

    let running = Application::new(test_config(&document))
        .handlers(handlers())
        .storage(counting_storage(&closed))
        .terminate(terminate.clone())
        .handle_signals(false)
        .launch()
        .await
        .unwrap();
    let base = format!("http://{}", running.local_addr());
    let http = client();

    let status = http.get(format!("{base}/v1/status")).send().await.unwrap();
    assert_eq!(status.status(), 200);
    assert_eq!(status.headers()["strict-transport-security"], HSTS_POLICY);
    assert_eq!(status.headers()["cache-control"], "no-cache, no-store, must-revalidate");
    assert!(status.headers().contains_key("traceparent"));
    assert_eq!(status.json::<Value>().await.unwrap(), json!({ "status": "ok" }));

    let item = http.get(format!("{base}/v1/items/7")).send().await.unwrap();
    assert_eq!(item.json::<Value>().await.unwrap(), json!({ "id": 7 }));

    let missing = http.get(format!("{base}/v1/items/8")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    let metrics = http.get(format!("{base}/metrics")).send().await.unwrap();
    assert_eq!(metrics.status(), 200);

    assert_eq!(
        running.shutdown(Signal::Terminate).await,
        Some(ExitOutcome::Success)
    );
    assert_eq!(running.coordinator().state(), ShutdownState::Terminated);
    assert_eq!(running.shutdown(Signal::Interrupt).await, None);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(terminate.codes(), vec![0]);
    assert!(http.get(format!("{base}/v1/status")).send().await.is_err());

    assert_eq!(running.wait().await, ExitOutcome::Success);
    let _ = std::fs::remove_file(document);
}

#[tokio::test]
async fn storage_failure_exits_with_one() {
    let document = write_route_document(ROUTE_DOCUMENT);
    let terminate = RecordingTerminate::new();

    let running = Application::new(test_config(&document))
        .handlers(handlers())
        .storage(Resource::new("storage", || async {
            Err::<(), _>(std::io::Error::other("pool already closed"))
        }))
        .terminate(terminate.clone())
        .handle_signals(false)
        .launch()
        .await
        .unwrap();

    assert_eq!(
        running.shutdown(Signal::Interrupt).await,
        Some(ExitOutcome::Failure)
    );
    assert_eq!(terminate.codes(), vec![1]);
    let _ = std::fs::remove_file(document);
}

struct TrackedSource {
    loads: Arc<AtomicUsize>,
}

impl RouteSource for TrackedSource {
    fn describe(&self) -> String {
        "tracked".to_string()
    }

    fn load(&self) -> BoxFuture<'_, Result<Router, RegistrationError>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(Router::new()) })
    }
}

#[tokio::test]
async fn integrity_failure_stops_before_routes_load() {
    let document = write_route_document(ROUTE_DOCUMENT);
    let loads = Arc::new(AtomicUsize::new(0));
    let ran_last = Arc::new(AtomicUsize::new(0));
    let ran = Arc::clone(&ran_last);

    let result = Application::new(test_config(&document))
        .integrity_check(check(|| Err::<(), _>("schema version mismatch")))
        .integrity_check(check(|| Err::<(), _>("missing migration 42")))
        .integrity_check(check(move || {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok::<(), std::io::Error>(())
        }))
        .routes(TrackedSource {
            loads: Arc::clone(&loads),
        })
        .handle_signals(false)
        .launch()
        .await;

    match result {
        Err(StartupError::Integrity(e)) => {
            assert_eq!(e.to_string(), "schema version mismatch\nmissing migration 42");
        }
        other => panic!("expected integrity failure, got {other:?}"),
    }
    assert_eq!(ran_last.load(Ordering::SeqCst), 1);
    assert_eq!(loads.load(Ordering::SeqCst), 0);
    let _ = std::fs::remove_file(document);
}

#[tokio::test]
async fn unknown_operation_aborts_startup() {
    let document = write_route_document(ROUTE_DOCUMENT);

    let result = Application::new(test_config(&document))
        .handlers(HandlerRegistry::new().register("getStatus", get_status))
        .handle_signals(false)
        .launch()
        .await;

    assert!(matches!(
        result,
        Err(StartupError::Registration(RegistrationError::UnknownOperation(ref id))) if id == "getItem"
    ));
    let _ = std::fs::remove_file(document);
}

#[tokio::test]
async fn missing_route_document_aborts_startup() {
    let document = std::env::temp_dir().join("does-not-exist-routes.json");

    let result = Application::new(test_config(&document))
        .handlers(handlers())
        .handle_signals(false)
        .launch()
        .await;

    assert!(matches!(
        result,
        Err(StartupError::Registration(RegistrationError::Read { .. }))
    ));
}
