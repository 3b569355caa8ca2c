//! HTTP server setup.
//!
//! # Responsibilities
//! - Bind the listener
//! - Serve the assembled pipeline on a background task
//! - Stop accepting on request and drain in-flight connections

use std::io;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// HTTP server for the assembled pipeline.
pub struct HttpServer {
    app: Router,
}

impl HttpServer {
    pub fn new(app: Router) -> Self {
        Self { app }
    }

    /// Bind to `address` and start serving.
    pub async fn bind(self, address: &str) -> io::Result<ServerHandle> {
        let listener = TcpListener::bind(address).await?;
        self.listen(listener)
    }

    /// Start serving on an already bound listener.
    ///
    /// Returns once the accept loop is running; requests are served on a
    /// background task until [`ServerHandle::close`] is called.
    pub fn listen(self, listener: TcpListener) -> io::Result<ServerHandle> {
        let local_addr = listener.local_addr()?;
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        tracing::info!(address = %local_addr, "HTTP server starting");

        let task = tokio::spawn(async move {
            axum::serve(listener, self.app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                    tracing::info!("HTTP server no longer accepting connections");
                })
                .await?;
            tracing::info!("HTTP server stopped");
            Ok::<(), io::Error>(())
        });

        Ok(ServerHandle {
            local_addr,
            stop: stop_tx,
            task,
        })
    }
}

/// Owner of a running server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<io::Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for open ones to drain.
    pub async fn close(self) -> io::Result<()> {
        // The serve task may already have ended on an accept error.
        let _ = self.stop.send(());
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(io::Error::other(e)),
        }
    }
}
