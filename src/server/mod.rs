//! Gateway wiring: shared state and the MCP handler.

pub mod handler;
pub mod state;

pub use handler::McpHandler;
pub use state::{GatewayState, GatewayStateBuilder};
