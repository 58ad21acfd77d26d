//! MCP gateway in front of a Supabase project.
//!
//! Every tool call passes through an admission pipeline: API-key
//! authentication, fixed-window rate limiting, statement screening,
//! deadline-bounded remote execution and redaction of sensitive fields.
//!
//! # Example
//!
//! ```no_run
//! use supabase_mcp_gateway::{
//!     config::GatewayConfig,
//!     protocol::McpServer,
//!     server::{GatewayStateBuilder, McpHandler},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::builder().from_env()?.build()?;
//!
//!     let state = Arc::new(GatewayStateBuilder::new().config(config).build()?);
//!     let handler = Arc::new(McpHandler::new(state));
//!
//!     McpServer::new("supabase-mcp-gateway", handler)
//!         .run_stdio()
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod protocol;
pub mod remote;
pub mod security;
pub mod server;
pub mod tools;

pub use config::{GatewayConfig, GatewayConfigBuilder, TransportKind};
pub use error::{GatewayError, McpError, Result};
pub use gateway::{AdmissionPipeline, ExecutionGate, PipelineResponse};
pub use protocol::{McpServer, RequestContext};
pub use remote::{PostgrestClient, RemoteExecutor};
pub use security::{KeyAuthenticator, RateLimiter, Redactor, StatementValidator};
pub use server::{GatewayState, GatewayStateBuilder, McpHandler};
