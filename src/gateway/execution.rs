//! Deadline-bounded statement execution.

use crate::error::{GatewayError, GatewayResult};
use crate::remote::RemoteExecutor;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Remote procedure that runs a statement.
pub const EXECUTE_QUERY_PROCEDURE: &str = "execute_query";

/// A validated statement and its bound parameters.
#[derive(Debug, Clone, Default)]
pub struct StatementRequest {
    pub statement: String,
    pub parameters: Map<String, Value>,
}

impl StatementRequest {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            parameters: Map::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    fn procedure_args(&self) -> Value {
        json!({
            "query_string": self.statement,
            "query_params": self.parameters,
        })
    }
}

/// Result of one execution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success(Value),
    Failure(String),
    Timeout,
}

impl ExecutionOutcome {
    pub fn into_result(self) -> GatewayResult<Value> {
        match self {
            Self::Success(payload) => Ok(payload),
            Self::Failure(reason) => Err(GatewayError::RemoteExecutionFailure(reason)),
            Self::Timeout => Err(GatewayError::QueryTimeout),
        }
    }
}

/// Races the remote executor against a timer.
///
/// When the timer wins, the pending call is dropped, which aborts the local
/// HTTP request. The statement may still finish on the database side; the
/// caller sees a timeout either way. Nothing is retried.
#[derive(Clone)]
pub struct ExecutionGate {
    executor: Arc<dyn RemoteExecutor>,
}

impl ExecutionGate {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { executor }
    }

    pub async fn execute_with_timeout(
        &self,
        request: &StatementRequest,
        limit: Duration,
    ) -> ExecutionOutcome {
        let call = self
            .executor
            .call_procedure(EXECUTE_QUERY_PROCEDURE, request.procedure_args());

        match timeout(limit, call).await {
            Ok(Ok(payload)) => {
                debug!(executor = self.executor.name(), "Statement executed");
                ExecutionOutcome::Success(payload)
            }
            Ok(Err(e)) => {
                warn!("Statement execution failed: {}", e);
                ExecutionOutcome::Failure(e.to_string())
            }
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "Statement timed out");
                ExecutionOutcome::Timeout
            }
        }
    }
}
