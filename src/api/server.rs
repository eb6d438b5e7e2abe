//! API server lifecycle: bind → spawn background task → return handle with
//! shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::api_router;
use crate::core_state::CoreState;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind API server on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("API server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Handle to a running API server.
pub struct ApiServer {
    pub local_addr: SocketAddr,
    pub started_at: chrono::DateTime<chrono::Utc>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ApiServer {
    /// Signal graceful shutdown. In-flight requests are allowed to finish.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Wait for the server task to exit.
    pub async fn wait(self) -> Result<(), ServerError> {
        self.task.await??;
        Ok(())
    }
}

/// Bind `bind_addr` and serve the API router in a background task.
pub async fn start_api_server(
    core: Arc<CoreState>,
    bind_addr: &str,
) -> Result<ApiServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: bind_addr.to_string(),
            source,
        })?;
    let addr = listener.local_addr()?;

    let app = api_router(core);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await;
        if let Err(e) = &result {
            tracing::error!("API server error: {e}");
        }
        tracing::info!("API server stopped");
        result
    });

    Ok(ApiServer {
        local_addr: addr,
        started_at: chrono::Utc::now(),
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::config::TriageConfig;

    fn test_core(dir: &tempfile::TempDir) -> Arc<CoreState> {
        let config = TriageConfig {
            upload_dir: dir.path().join("uploads"),
            ..TriageConfig::default()
        };
        Arc::new(CoreState::new(config).unwrap())
    }

    #[tokio::test]
    async fn start_serve_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = start_api_server(test_core(&dir), "127.0.0.1:0")
            .await
            .expect("server should start");
        assert!(server.local_addr.port() > 0);

        let mut stream = tokio::net::TcpStream::connect(server.local_addr).await.unwrap();
        stream
            .write_all(b"GET /api/health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "got: {response}");
        assert!(response.contains("\"status\":\"ok\""));

        server.shutdown();
        server.wait().await.unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = start_api_server(test_core(&dir), "not-an-address").await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }
}
