//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use service_bootstrap::config::{AppConfig, RuntimeMode};
use service_bootstrap::lifecycle::Terminate;

/// Route document used by most tests.
pub const ROUTE_DOCUMENT: &str = r#"{
    "swagger": "2.0",
    "basePath": "/v1",
    "paths": {
        "/status": { "get": { "operationId": "getStatus" } },
        "/items/{id}": { "get": { "operationId": "getItem" } }
    }
}"#;

/// Write `contents` to a fresh file under the temp dir.
pub fn write_route_document(contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("routes-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, contents).unwrap();
    path
}

/// Config listening on an ephemeral local port.
pub fn test_config(spec_path: &PathBuf) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.bind_address = "127.0.0.1:0".to_string();
    config.server.mode = RuntimeMode::Test;
    config.pipeline.access_log = false;
    config.routes.spec_path = spec_path.display().to_string();
    config
}

/// Records exit codes instead of exiting.
#[derive(Default)]
pub struct RecordingTerminate {
    codes: Mutex<Vec<i32>>,
}

impl RecordingTerminate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn codes(&self) -> Vec<i32> {
        self.codes.lock().unwrap().clone()
    }
}

impl Terminate for RecordingTerminate {
    fn terminate(&self, code: i32) {
        self.codes.lock().unwrap().push(code);
    }
}

/// HTTP client without connection reuse, so shutdown never waits on idle sockets.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}
