//! MCP request handler backed by the admission pipeline.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::{
    CallToolParams, CallToolResult, Handler, InitializeParams, InitializeResult, ListToolsResult,
    MCP_VERSION, RequestContext, ServerCapabilities, ServerInfo, ToolsCapability,
};
use crate::server::state::GatewayState;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Routes MCP calls to tools, with every tool call admitted by the pipeline.
pub struct McpHandler {
    state: Arc<GatewayState>,
}

impl McpHandler {
    pub fn new(state: Arc<GatewayState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }
}

#[async_trait]
impl Handler for McpHandler {
    async fn initialize(&self, params: InitializeParams) -> ProtocolResult<InitializeResult> {
        info!(
            "Initialize request from {} v{}",
            params.client_info.name, params.client_info.version
        );
        debug!("Client capabilities: {:?}", params.capabilities);
        self.state.set_client_info(params.client_info);

        let capabilities = ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
        };

        let security = &self.state.config.security;
        let instructions = format!(
            "Supabase gateway. Every tool call needs the x-api-key header \
            (over stdio: params._meta.headers). Available tools: getSchema, getTableInfo, \
            getTableColumns, getForeignKeys, executeQuery. Allowed statement types: {}.",
            security.allowed_query_types.join(", ")
        );

        Ok(InitializeResult {
            protocol_version: MCP_VERSION.into(),
            capabilities,
            server_info: ServerInfo {
                name: self.state.config.name.to_string(),
                version: self.state.config.version.to_string(),
            },
            instructions: Some(instructions),
        })
    }

    async fn initialized(&self) -> ProtocolResult<()> {
        info!("Client initialized");
        Ok(())
    }

    async fn shutdown(&self) -> ProtocolResult<()> {
        let limiter = self.state.pipeline.rate_limiter().status();
        let client = self.state.client_info().map(|c| c.name).unwrap_or_default();
        info!(
            client = %client,
            requests = self.state.request_count(),
            tracked_windows = limiter.tracked_windows,
            "Shutdown request received"
        );
        Ok(())
    }

    async fn list_tools(&self) -> ProtocolResult<ListToolsResult> {
        let tools = self.state.tools.list();
        debug!("Listing {} tools", tools.len());

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        params: CallToolParams,
        ctx: &RequestContext,
    ) -> ProtocolResult<CallToolResult> {
        let request_id = self.state.next_request_id();
        debug!(request_id, tool = %params.name, "Tool call");

        let tools = &self.state.tools;
        let CallToolParams {
            name, arguments, ..
        } = params;

        let response = self
            .state
            .pipeline
            .admit(ctx, || tools.execute(&name, arguments))
            .await;

        if response.is_success() {
            return Ok(CallToolResult::json(&response.body));
        }

        Err(ProtocolError::Rejected {
            status: response.status,
            message: response.error_message().unwrap_or_default().to_string(),
        })
    }
}
