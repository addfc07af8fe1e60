//! ODBC MCP Server - Main entry point.
//!
//! This server provides MCP (Model Context Protocol) tools for AI assistants
//! to query and modify a SQL Server database over one shared ODBC connection.

use clap::Parser;
use odbc_mcp_server::config::{Config, TransportMode};
use odbc_mcp_server::db::{BlockingBridge, ConnectionManager, OdbcDriver};
use odbc_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout belongs to the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    init_tracing(&config);

    info!(
        transport = %config.transport,
        "Starting ODBC MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let bridge_config = config.bridge_config();
    info!(
        max_in_flight = ?bridge_config.max_in_flight,
        call_timeout_secs = ?bridge_config.call_timeout.map(|d| d.as_secs()),
        "Blocking bridge configured"
    );

    let connection_manager = Arc::new(ConnectionManager::new(
        config.database_config(),
        Arc::new(OdbcDriver::new()),
        BlockingBridge::new(bridge_config),
    ));

    // A failed connect leaves the server running in degraded mode
    let state = connection_manager.start().await;
    info!(state = %state, "Database connection state");

    let result = match config.transport {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            let transport = StdioTransport::new(connection_manager.clone());
            connection_manager.scoped(transport.run()).await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            let transport = HttpTransport::new(
                connection_manager.clone(),
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            );
            connection_manager.scoped(transport.run()).await
        }
    };

    if let Err(e) = result {
        error!(kind = e.kind(), error = %e, "Server startup or transport failed");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
