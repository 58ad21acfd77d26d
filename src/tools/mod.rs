//! MCP tool definitions and registry.

pub mod query;
pub mod registry;
pub mod schema;

pub use query::ExecuteQueryTool;
pub use registry::{ToolHandler, ToolRegistry, parse_args};
pub use schema::{GetForeignKeysTool, GetSchemaTool, GetTableColumnsTool, GetTableInfoTool};

use crate::config::SecurityConfig;
use crate::gateway::ExecutionGate;
use crate::remote::RemoteExecutor;
use crate::security::StatementValidator;
use std::sync::Arc;

/// Create and register all tools.
pub fn create_registry(executor: Arc<dyn RemoteExecutor>, security: &SecurityConfig) -> ToolRegistry {
    let registry = ToolRegistry::new();

    // Schema introspection
    registry.register(GetSchemaTool::new(Arc::clone(&executor)));
    registry.register(GetTableInfoTool::new(Arc::clone(&executor)));
    registry.register(GetTableColumnsTool::new(Arc::clone(&executor)));
    registry.register(GetForeignKeysTool::new(Arc::clone(&executor)));

    // Statement execution
    registry.register(ExecuteQueryTool::new(
        StatementValidator::new(&security.allowed_query_types),
        ExecutionGate::new(executor),
        security.query_timeout,
    ));

    registry
}
