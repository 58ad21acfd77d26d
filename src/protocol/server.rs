//! Line-oriented MCP server loop.

use crate::error::{McpError, ProtocolError, Result};
use crate::protocol::handler::{Dispatcher, Handler, RequestContext};
use crate::protocol::transport::{StdioTransport, Transport};
use crate::protocol::types::*;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, instrument, warn};

/// Lifecycle of a stdio session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

/// MCP server reading one JSON-RPC message per line.
///
/// Lifecycle methods run in arrival order on the read loop. Every other
/// request is dispatched on its own task and answers when it completes, so
/// responses may be written out of order and correlate by `id`.
pub struct McpServer<H: Handler> {
    name: String,
    dispatcher: Arc<Dispatcher<H>>,
    state: RwLock<ServerState>,
}

impl<H: Handler + 'static> McpServer<H> {
    pub fn new(name: impl Into<String>, handler: Arc<H>) -> Self {
        Self {
            name: name.into(),
            dispatcher: Arc::new(Dispatcher::new(handler)),
            state: RwLock::new(ServerState::Created),
        }
    }

    pub async fn state(&self) -> ServerState {
        *self.state.read().await
    }

    /// Serve over stdin and stdout until EOF or `shutdown`.
    #[instrument(skip(self), fields(server = %self.name))]
    pub async fn run_stdio(&self) -> Result<()> {
        self.run_with_transport(Arc::new(StdioTransport::stdio())).await
    }

    /// Serve over any transport until EOF or `shutdown`.
    ///
    /// Returns once every in-flight request has written its response.
    pub async fn run_with_transport<T: Transport + 'static>(&self, transport: Arc<T>) -> Result<()> {
        info!("Starting stdio transport");
        let mut in_flight = JoinSet::new();

        loop {
            while let Some(finished) = in_flight.try_join_next() {
                log_task_failure(finished);
            }

            let message = match transport.read_message().await {
                Ok(Some(msg)) => msg,
                Ok(None) => {
                    debug!("EOF received, shutting down");
                    break;
                }
                Err(McpError::Protocol(ProtocolError::ParseError)) => {
                    let response = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                    if let Err(e) = transport.write_response(&response).await {
                        error!("Failed to send error response: {}", e);
                    }
                    continue;
                }
                Err(e) => {
                    error!("Transport error: {}", e);
                    break;
                }
            };

            let request = match message {
                Message::Request(request) => request,
                Message::Response(response) => {
                    warn!("Unexpected response received: {:?}", response.id);
                    continue;
                }
            };

            let method = request.method.clone();
            self.update_state_for_method(&method).await;

            if !is_lifecycle(&method) {
                let dispatcher = Arc::clone(&self.dispatcher);
                let transport = Arc::clone(&transport);
                in_flight.spawn(async move {
                    respond(dispatcher.as_ref(), transport.as_ref(), request).await;
                });
                continue;
            }

            if method == "shutdown" {
                info!(in_flight = in_flight.len(), "Shutdown request received");
                drain(&mut in_flight).await;
            }
            respond(self.dispatcher.as_ref(), transport.as_ref(), request).await;
            if method == "shutdown" {
                break;
            }
        }

        drain(&mut in_flight).await;
        *self.state.write().await = ServerState::Stopped;
        info!("Server stopped");
        Ok(())
    }

    async fn update_state_for_method(&self, method: &str) {
        let mut state = self.state.write().await;
        match method {
            "initialize" if *state == ServerState::Created => {
                *state = ServerState::Initializing;
            }
            "initialized" | "notifications/initialized"
                if *state == ServerState::Initializing =>
            {
                *state = ServerState::Running;
                info!("Session initialized");
            }
            "shutdown" => *state = ServerState::ShuttingDown,
            _ => {}
        }
    }
}

fn is_lifecycle(method: &str) -> bool {
    matches!(
        method,
        "initialize" | "initialized" | "notifications/initialized" | "shutdown"
    )
}

async fn respond<H: Handler, T: Transport>(
    dispatcher: &Dispatcher<H>,
    transport: &T,
    request: JsonRpcRequest,
) {
    let is_notification = request.is_notification();
    let ctx = RequestContext::new(&request);
    let response = dispatcher.dispatch(request, &ctx).await;

    if !is_notification && let Err(e) = transport.write_response(&response).await {
        error!("Failed to send response: {}", e);
    }
}

async fn drain(in_flight: &mut JoinSet<()>) {
    while let Some(finished) = in_flight.join_next().await {
        log_task_failure(finished);
    }
}

fn log_task_failure(finished: std::result::Result<(), JoinError>) {
    if let Err(e) = finished {
        error!("Request task failed: {}", e);
    }
}
