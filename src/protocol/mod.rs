//! MCP protocol implementation over JSON-RPC 2.0.

pub mod handler;
pub mod http;
pub mod server;
pub mod transport;
pub mod types;

pub use handler::{API_KEY_HEADER, CLIENT_ID_HEADER, Dispatcher, Handler, RequestContext};
pub use server::{McpServer, ServerState};
pub use transport::{LineTransport, StdioTransport, Transport};
pub use types::*;
