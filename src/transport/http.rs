//! Streamable HTTP transport.
//!
//! Each MCP session gets its own `OdbcService`, but all of them share one
//! `ToolDispatcher` and so one database connection. The connection is closed
//! once the server stops or the shutdown grace period runs out.

use crate::db::ConnectionManager;
use crate::error::{DbError, DbResult};
use crate::mcp::OdbcService;
use crate::tools::ToolDispatcher;
use crate::transport::{Transport, wait_for_signal};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub struct HttpTransport {
    connection_manager: Arc<ConnectionManager>,
    host: String,
    port: u16,
    /// Path the MCP service is mounted on; "/" serves every path
    endpoint: String,
}

impl HttpTransport {
    pub fn new(
        connection_manager: Arc<ConnectionManager>,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            connection_manager,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting MCP server with HTTP transport on {}", bind_addr);

        let dispatcher = Arc::new(ToolDispatcher::new(self.connection_manager.clone()));

        let service = StreamableHttpService::new(
            move || Ok(OdbcService::with_dispatcher(dispatcher.clone())),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // nest_service rejects "/"
        let app = if self.endpoint == "/" {
            axum::Router::new().fallback_service(service)
        } else {
            axum::Router::new().nest_service(&self.endpoint, service)
        };

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::transport(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        info!(endpoint = %self.endpoint, "MCP endpoint ready");

        // Open SSE streams can hold graceful shutdown forever
        const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();

        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        let served = tokio::select! {
            result = server => {
                match result {
                    Ok(()) => {
                        info!("HTTP server stopped");
                        Ok(())
                    }
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        Err(DbError::transport(format!("HTTP server error: {}", e)))
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Draining MCP sessions before closing the database connection"
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Sessions still open after grace period; stopping anyway");
                    }
                    _ = wait_for_signal() => {
                        warn!("Second signal received; stopping without draining");
                    }
                }
            } => Ok(()),
        };

        info!("Closing database connection");
        self.connection_manager.close().await;

        served
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_connection_manager;

    #[test]
    fn test_http_transport_creation() {
        let transport = HttpTransport::new(test_connection_manager(), "127.0.0.1", 8080, "/mcp");
        assert_eq!(transport.name(), "http");
        assert_eq!(transport.bind_addr(), "127.0.0.1:8080");
        assert_eq!(transport.endpoint(), "/mcp");
    }

    #[test]
    fn test_http_transport_root_endpoint() {
        let transport = HttpTransport::new(test_connection_manager(), "0.0.0.0", 3000, "/");
        assert_eq!(transport.bind_addr(), "0.0.0.0:3000");
        assert_eq!(transport.endpoint(), "/");
    }

    #[tokio::test]
    async fn test_bind_failure_is_transport_error() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = occupied.local_addr().unwrap().port();

        let manager = test_connection_manager();
        let transport = HttpTransport::new(manager.clone(), "127.0.0.1", port, "/");
        let err = transport.run().await.unwrap_err();
        assert_eq!(err.kind(), "TransportFailure");
        assert!(err.to_string().contains("Failed to bind"));
    }
}
