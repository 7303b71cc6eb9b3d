//! HTTP server lifecycle for the analysis API.
//!
//! bind → spawn background task → return handle with shutdown channel.

use std::net::SocketAddr;

use axum::Router;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Handle to a running analysis server.
pub struct AnalysisServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl AnalysisServer {
    /// Ask the server to stop accepting connections. In-flight requests finish.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("Analysis server shutdown signal sent");
        }
    }

    /// Wait for the serve loop to exit.
    pub async fn stopped(self) {
        if let Err(e) = self.task.await {
            tracing::error!("Analysis server task failed: {e}");
        }
    }
}

/// Bind `addr` and serve `app` in a background task.
///
/// Port `0` picks an ephemeral port; the bound address is on the handle.
pub async fn start_server(addr: SocketAddr, app: Router) -> Result<AnalysisServer, String> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind analysis server on {addr}: {e}"))?;

    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("Analysis server received shutdown signal");
        };

        tracing::info!(%addr, "Analysis server listening");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("Analysis server error: {e}");
        }

        tracing::info!("Analysis server stopped");
    });

    Ok(AnalysisServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}
