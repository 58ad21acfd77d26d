//! Gateway binary entry point.

use anyhow::Result;
use std::sync::Arc;
use supabase_mcp_gateway::{
    config::{GatewayConfig, TransportKind},
    protocol::{McpServer, http},
    server::{GatewayStateBuilder, McpHandler},
};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = GatewayConfig::builder().from_env().and_then(|b| b.build());

    let level = config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".into());
    init_tracing(&level);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to start gateway: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let name = config.name.to_string();
    let transport = config.server.transport;
    let bind_address = config.server.bind_address();

    let state = Arc::new(GatewayStateBuilder::new().config(config).build()?);
    info!("Gateway state initialized with {} tools", state.tools.len());

    let handler = Arc::new(McpHandler::new(state));

    match transport {
        TransportKind::Stdio => {
            info!("Serving MCP over stdio");
            McpServer::new(name, handler).run_stdio().await?;
        }
        TransportKind::Http => {
            let listener = TcpListener::bind(&bind_address).await?;
            info!("MCP Supabase gateway is running on {}", bind_address);
            http::serve(handler, listener).await?;
        }
    }

    info!("Gateway shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured level applies to this crate.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("supabase_mcp_gateway={},warn", level)));

    // JSON to stderr; stdout carries the stdio transport
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .json()
        .init();
}
