//! Statement execution tool.

use crate::define_tool;
use crate::error::Result;
use crate::gateway::{ExecutionGate, StatementRequest};
use crate::protocol::Tool;
use crate::security::StatementValidator;
use crate::tools::registry::{ToolHandler, parse_args};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Default, Deserialize)]
pub struct ExecuteQueryArgs {
    /// Kept untyped so a non-string query is reported as empty, not as a decode error.
    #[serde(default)]
    pub query: Option<Value>,
    #[serde(default)]
    pub params: Option<Map<String, Value>>,
}

pub struct ExecuteQueryTool {
    validator: StatementValidator,
    gate: ExecutionGate,
    timeout: Duration,
}

impl ExecuteQueryTool {
    pub fn new(validator: StatementValidator, gate: ExecutionGate, timeout: Duration) -> Self {
        Self {
            validator,
            gate,
            timeout,
        }
    }
}

#[async_trait]
impl ToolHandler for ExecuteQueryTool {
    fn definition(&self) -> Tool {
        let allowed = self.validator.allowed_types().join(", ");
        define_tool! {
            name: "executeQuery",
            description: format!(
                "Execute a SQL statement through the remote execute_query procedure. \
                Allowed statement types: {}. Statements time out after {} ms.",
                allowed,
                self.timeout.as_millis()
            ),
            schema: {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The SQL statement to execute"
                    },
                    "params": {
                        "type": "object",
                        "description": "Named parameters bound to the statement"
                    }
                },
                "required": ["query"]
            }
        }
    }

    #[instrument(skip(self, arguments), fields(tool = "executeQuery"))]
    async fn execute(&self, arguments: Value) -> Result<Value> {
        let args: ExecuteQueryArgs = parse_args(arguments)?;

        let statement = args.query.as_ref().and_then(Value::as_str);
        self.validator.validate(statement)?;

        let request = StatementRequest::new(statement.unwrap_or_default())
            .with_parameters(args.params.unwrap_or_default());
        debug!(timeout_ms = self.timeout.as_millis() as u64, "Executing statement");

        let payload = self
            .gate
            .execute_with_timeout(&request, self.timeout)
            .await
            .into_result()?;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::execution::tests::{MockExecutor, Reply};
    use serde_json::json;
    use std::sync::Arc;

    fn tool(mock: Arc<MockExecutor>, timeout_ms: u64) -> ExecuteQueryTool {
        ExecuteQueryTool::new(
            StatementValidator::default(),
            ExecutionGate::new(mock),
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test]
    async fn test_executes_valid_select() {
        let mock = Arc::new(MockExecutor::new(Reply::Payload(json!([{"id": 1}]))));
        let tool = tool(mock.clone(), 1000);

        let result = tool
            .execute(json!({"query": "SELECT * FROM t WHERE id = :id", "params": {"id": 1}}))
            .await
            .unwrap();

        assert_eq!(result, json!([{"id": 1}]));
        assert_eq!(
            mock.calls.lock()[0].1["query_params"],
            json!({"id": 1})
        );
    }

    #[tokio::test]
    async fn test_rejections_never_reach_remote() {
        let mock = Arc::new(MockExecutor::new(Reply::Payload(Value::Null)));
        let tool = tool(mock.clone(), 1000);

        let cases = [
            (json!({}), "Query must be a non-empty string"),
            (json!({"query": 42}), "Query must be a non-empty string"),
            (json!({"query": "   "}), "Query must be a non-empty string"),
            (
                json!({"query": "DELETE FROM t"}),
                "Query type not allowed. Allowed types: SELECT",
            ),
            (
                json!({"query": "SELECT 1; -- drop"}),
                "Query contains potentially dangerous patterns",
            ),
        ];

        for (args, message) in cases {
            let err = tool.execute(args).await.unwrap_err();
            assert_eq!(err.to_string(), message);
        }
        assert!(mock.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_is_wrapped() {
        let tool = tool(Arc::new(MockExecutor::new(Reply::Fail("syntax error".into()))), 1000);

        let err = tool.execute(json!({"query": "SELECT x"})).await.unwrap_err();
        assert_eq!(err.to_string(), "Query execution failed: syntax error");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let tool = tool(Arc::new(MockExecutor::new(Reply::Hang)), 100);

        let err = tool.execute(json!({"query": "SELECT 1"})).await.unwrap_err();
        assert_eq!(err.to_string(), "Query execution timed out");
    }

    #[test]
    fn test_definition_lists_allowed_types() {
        let tool = ExecuteQueryTool::new(
            StatementValidator::new(["select", "with"]),
            ExecutionGate::new(Arc::new(MockExecutor::new(Reply::Hang))),
            Duration::from_secs(5),
        );
        let definition = tool.definition();
        assert_eq!(definition.name, "executeQuery");
        assert!(
            definition
                .description
                .unwrap()
                .contains("Allowed statement types: SELECT, WITH")
        );
    }
}
