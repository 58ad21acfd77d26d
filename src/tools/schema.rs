//! Schema introspection tools: getSchema, getTableInfo, getTableColumns, getForeignKeys.

use crate::define_tool;
use crate::error::{GatewayError, GatewayResult, RemoteError, Result};
use crate::protocol::Tool;
use crate::remote::{Filter, RemoteExecutor};
use crate::tools::registry::{ToolHandler, parse_args};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, instrument};

pub const SCHEMA_PROCEDURE: &str = "get_schema_information";
pub const TABLE_INFO_PROCEDURE: &str = "get_table_information";

const COLUMNS_TABLE: &str = "information_schema.columns";
const COLUMNS_SELECT: &[&str] = &["column_name", "data_type", "is_nullable", "column_default"];

const KEY_USAGE_TABLE: &str = "information_schema.key_column_usage";
const KEY_USAGE_SELECT: &[&str] = &[
    "constraint_name",
    "column_name",
    "referenced_table_name",
    "referenced_column_name",
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableArgs {
    #[serde(default)]
    pub table_name: Option<String>,
}

impl TableArgs {
    fn require(self) -> GatewayResult<String> {
        match self.table_name {
            Some(name) if !name.trim().is_empty() => Ok(name),
            _ => Err(GatewayError::MissingTableName),
        }
    }
}

fn lookup_failed(what: &'static str) -> impl FnOnce(RemoteError) -> GatewayError {
    move |e| GatewayError::SchemaLookupFailure {
        what,
        reason: e.to_string(),
    }
}

fn table_tool(name: &str, description: &str) -> Tool {
    define_tool! {
        name: name,
        description: description,
        schema: {
            "type": "object",
            "properties": {
                "tableName": {
                    "type": "string",
                    "description": "Name of the table"
                }
            },
            "required": ["tableName"]
        }
    }
}

pub struct GetSchemaTool {
    executor: Arc<dyn RemoteExecutor>,
}

impl GetSchemaTool {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ToolHandler for GetSchemaTool {
    fn definition(&self) -> Tool {
        define_tool! {
            name: "getSchema",
            description: "Return the full database schema: tables, columns and relationships.",
            schema: {"type": "object", "properties": {}}
        }
    }

    #[instrument(skip(self, _arguments), fields(tool = "getSchema"))]
    async fn execute(&self, _arguments: Value) -> Result<Value> {
        let schema = self
            .executor
            .call_procedure(SCHEMA_PROCEDURE, json!({}))
            .await
            .map_err(lookup_failed("schema"))?;
        Ok(schema)
    }
}

pub struct GetTableInfoTool {
    executor: Arc<dyn RemoteExecutor>,
}

impl GetTableInfoTool {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ToolHandler for GetTableInfoTool {
    fn definition(&self) -> Tool {
        table_tool("getTableInfo", "Return detailed information about one table.")
    }

    #[instrument(skip(self, arguments), fields(tool = "getTableInfo"))]
    async fn execute(&self, arguments: Value) -> Result<Value> {
        let table = parse_args::<TableArgs>(arguments)?.require()?;
        debug!(table = %table, "Fetching table information");

        let info = self
            .executor
            .call_procedure(TABLE_INFO_PROCEDURE, json!({ "table_name": table }))
            .await
            .map_err(lookup_failed("table info"))?;
        Ok(info)
    }
}

pub struct GetTableColumnsTool {
    executor: Arc<dyn RemoteExecutor>,
}

impl GetTableColumnsTool {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ToolHandler for GetTableColumnsTool {
    fn definition(&self) -> Tool {
        table_tool("getTableColumns", "List a table's columns with type, nullability and default.")
    }

    #[instrument(skip(self, arguments), fields(tool = "getTableColumns"))]
    async fn execute(&self, arguments: Value) -> Result<Value> {
        let table = parse_args::<TableArgs>(arguments)?.require()?;

        let columns = self
            .executor
            .select(COLUMNS_TABLE, COLUMNS_SELECT, &[Filter::eq("table_name", table)])
            .await
            .map_err(lookup_failed("table columns"))?;
        Ok(columns)
    }
}

pub struct GetForeignKeysTool {
    executor: Arc<dyn RemoteExecutor>,
}

impl GetForeignKeysTool {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ToolHandler for GetForeignKeysTool {
    fn definition(&self) -> Tool {
        table_tool("getForeignKeys", "List the foreign keys declared on a table.")
    }

    #[instrument(skip(self, arguments), fields(tool = "getForeignKeys"))]
    async fn execute(&self, arguments: Value) -> Result<Value> {
        let table = parse_args::<TableArgs>(arguments)?.require()?;

        let filters = [
            Filter::eq("table_name", table),
            Filter::not_null("referenced_table_name"),
        ];
        let keys = self
            .executor
            .select(KEY_USAGE_TABLE, KEY_USAGE_SELECT, &filters)
            .await
            .map_err(lookup_failed("foreign keys"))?;
        Ok(keys)
    }
}
