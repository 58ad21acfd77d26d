//! Remote executor trait.

use crate::error::RemoteResult;
use async_trait::async_trait;
use serde_json::Value;

/// Row filter for table reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `column = value`
    Eq(String, String),
    /// `column IS NOT NULL`
    NotNull(String),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq(column.into(), value.into())
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Self::NotNull(column.into())
    }
}

/// Async access to the remote database endpoint.
///
/// Implementations: [`PostgrestClient`](crate::remote::PostgrestClient).
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Returns the executor name (e.g., "postgrest").
    fn name(&self) -> &'static str;

    /// Invokes a named remote procedure with a JSON argument object.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Status`](crate::error::RemoteError::Status) when
    /// the endpoint reports a failure.
    async fn call_procedure(&self, procedure: &str, args: Value) -> RemoteResult<Value>;

    /// Reads `columns` from `table`, keeping rows that pass every filter.
    ///
    /// # Arguments
    ///
    /// * `table` - Table name, optionally schema-qualified (e.g., "information_schema.columns")
    async fn select(&self, table: &str, columns: &[&str], filters: &[Filter])
    -> RemoteResult<Value>;
}
