//! Request handler and method dispatcher.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::types::*;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Optional header naming the caller for rate limiting.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Handler trait for processing MCP requests.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle initialize request.
    async fn initialize(&self, params: InitializeParams) -> ProtocolResult<InitializeResult>;

    /// Handle initialized notification.
    async fn initialized(&self) -> ProtocolResult<()>;

    /// Handle shutdown request.
    async fn shutdown(&self) -> ProtocolResult<()>;

    /// List available tools.
    async fn list_tools(&self) -> ProtocolResult<ListToolsResult>;

    /// Call a tool on behalf of the caller described by `ctx`.
    async fn call_tool(
        &self,
        params: CallToolParams,
        ctx: &RequestContext,
    ) -> ProtocolResult<CallToolResult>;

    /// Handle ping request.
    async fn ping(&self) -> ProtocolResult<Value> {
        Ok(serde_json::json!({}))
    }
}

/// Method dispatcher that routes requests to appropriate handlers.
pub struct Dispatcher<H: Handler> {
    handler: Arc<H>,
}

impl<H: Handler> Dispatcher<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Dispatch a request to the appropriate handler method.
    #[instrument(skip(self, request, ctx), fields(method = %request.method))]
    pub async fn dispatch(&self, request: JsonRpcRequest, ctx: &RequestContext) -> JsonRpcResponse {
        debug!("Dispatching request: {}", request.method);

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "initialized" | "notifications/initialized" => self.handle_initialized().await,
            "shutdown" => self.handle_shutdown().await,
            "ping" => self.handle_ping().await,
            "tools/list" => self.handle_list_tools().await,
            "tools/call" => self.handle_call_tool(request.params, ctx).await,
            method => {
                warn!("Unknown method: {}", method);
                Err(ProtocolError::MethodNotFound(method.to_string()))
            }
        };

        match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(ProtocolError::Rejected { status, message }) => {
                let envelope = serde_json::json!({ "error": message, "status": status });
                JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::new(REJECTED_CODE, message).with_data(envelope),
                )
            }
            Err(e) => {
                error!("Request failed: {}", e);
                JsonRpcResponse::error(request.id, JsonRpcError::new(e.code(), e.to_string()))
            }
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> ProtocolResult<Value> {
        let params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ProtocolError::InvalidParams(e.to_string().into()))?
            .ok_or_else(|| ProtocolError::InvalidParams("Missing params".into()))?;

        let result = self.handler.initialize(params).await?;
        serde_json::to_value(result).map_err(|e| ProtocolError::InternalError(e.to_string().into()))
    }

    async fn handle_initialized(&self) -> ProtocolResult<Value> {
        self.handler.initialized().await?;
        Ok(Value::Null)
    }

    async fn handle_shutdown(&self) -> ProtocolResult<Value> {
        self.handler.shutdown().await?;
        Ok(Value::Null)
    }

    async fn handle_ping(&self) -> ProtocolResult<Value> {
        self.handler.ping().await
    }

    async fn handle_list_tools(&self) -> ProtocolResult<Value> {
        let result = self.handler.list_tools().await?;
        serde_json::to_value(result).map_err(|e| ProtocolError::InternalError(e.to_string().into()))
    }

    async fn handle_call_tool(
        &self,
        params: Option<Value>,
        ctx: &RequestContext,
    ) -> ProtocolResult<Value> {
        let params: CallToolParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ProtocolError::InvalidParams(e.to_string().into()))?
            .ok_or_else(|| ProtocolError::InvalidParams("Missing params".into()))?;

        let result = self.handler.call_tool(params, ctx).await?;
        serde_json::to_value(result).map_err(|e| ProtocolError::InternalError(e.to_string().into()))
    }
}

/// Per-request caller information.
///
/// Header names are stored lowercase and looked up case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: Option<RequestId>,
    pub method: String,
    headers: HashMap<String, String>,
}

impl RequestContext {
    /// Build a context from a request, taking headers from `params._meta.headers`.
    pub fn new(request: &JsonRpcRequest) -> Self {
        let mut ctx = Self {
            request_id: request.id.clone(),
            method: request.method.clone(),
            headers: HashMap::new(),
        };

        let meta_headers = request
            .params
            .as_ref()
            .and_then(|p| p.get("_meta"))
            .and_then(|m| m.get("headers"))
            .and_then(Value::as_object);

        if let Some(headers) = meta_headers {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    ctx = ctx.with_header(name, value);
                }
            }
        }
        ctx
    }

    pub fn for_method(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.header(API_KEY_HEADER)
    }

    /// Rate-limit identity: the client id when given, else the API key.
    pub fn caller_identity(&self) -> Option<&str> {
        self.header(CLIENT_ID_HEADER)
            .filter(|id| !id.is_empty())
            .or_else(|| self.api_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockHandler {
        initialized: AtomicBool,
    }

    impl MockHandler {
        fn new() -> Self {
            Self {
                initialized: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Handler for MockHandler {
        async fn initialize(&self, _params: InitializeParams) -> ProtocolResult<InitializeResult> {
            self.initialized.store(true, Ordering::SeqCst);
            Ok(InitializeResult {
                protocol_version: MCP_VERSION.into(),
                capabilities: ServerCapabilities::default(),
                server_info: ServerInfo {
                    name: "test".into(),
                    version: "1.0".into(),
                },
                instructions: None,
            })
        }

        async fn initialized(&self) -> ProtocolResult<()> {
            Ok(())
        }

        async fn shutdown(&self) -> ProtocolResult<()> {
            Ok(())
        }

        async fn list_tools(&self) -> ProtocolResult<ListToolsResult> {
            Ok(ListToolsResult {
                tools: vec![],
                next_cursor: None,
            })
        }

        async fn call_tool(
            &self,
            _params: CallToolParams,
            ctx: &RequestContext,
        ) -> ProtocolResult<CallToolResult> {
            match ctx.api_key() {
                Some(_) => Ok(CallToolResult::text("test")),
                None => Err(ProtocolError::Rejected {
                    status: 401,
                    message: "API key is required".into(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_dispatcher_initialize() {
        let handler = Arc::new(MockHandler::new());
        let dispatcher = Dispatcher::new(handler.clone());

        let request = JsonRpcRequest::new("initialize")
            .with_id(1)
            .with_params(serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {
                    "name": "test-client",
                    "version": "1.0"
                }
            }));

        let ctx = RequestContext::new(&request);
        let response = dispatcher.dispatch(request, &ctx).await;
        assert!(response.result.is_some());
        assert!(response.error.is_none());
        assert!(handler.initialized.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_dispatcher_unknown_method() {
        let handler = Arc::new(MockHandler::new());
        let dispatcher = Dispatcher::new(handler);

        let request = JsonRpcRequest::new("unknown/method").with_id(1);
        let ctx = RequestContext::new(&request);
        let response = dispatcher.dispatch(request, &ctx).await;

        assert!(response.result.is_none());
        assert!(response.error.is_some());
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_dispatcher_rejection_envelope() {
        let dispatcher = Dispatcher::new(Arc::new(MockHandler::new()));

        let request = JsonRpcRequest::new("tools/call")
            .with_id(7)
            .with_params(serde_json::json!({"name": "getSchema", "arguments": {}}));
        let ctx = RequestContext::new(&request);
        let response = dispatcher.dispatch(request, &ctx).await;

        let error = response.error.unwrap();
        assert_eq!(error.code, REJECTED_CODE);
        assert_eq!(error.message, "API key is required");
        assert_eq!(
            error.data,
            Some(serde_json::json!({"error": "API key is required", "status": 401}))
        );
    }

    #[test]
    fn test_context_from_meta_headers() {
        let request = JsonRpcRequest::new("tools/call").with_params(serde_json::json!({
            "name": "executeQuery",
            "_meta": {"headers": {"X-API-Key": "k", "x-client-id": "c", "x-number": 5}}
        }));

        let ctx = RequestContext::new(&request);
        assert_eq!(ctx.api_key(), Some("k"));
        assert_eq!(ctx.header("X-CLIENT-ID"), Some("c"));
        assert_eq!(ctx.caller_identity(), Some("c"));
        assert_eq!(ctx.header("x-number"), None);
    }

    #[test]
    fn test_identity_falls_back_to_api_key() {
        let ctx = RequestContext::for_method("tools/call")
            .with_header("x-api-key", "k")
            .with_header("x-client-id", "");
        assert_eq!(ctx.caller_identity(), Some("k"));
    }
}
