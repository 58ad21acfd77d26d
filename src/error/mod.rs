//! Error types for the gateway.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` conversions.

use std::borrow::Cow;
use thiserror::Error;

/// Main error type for the MCP gateway.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Gateway(#[from] GatewayError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: Cow<'static, str> },
}

/// JSON-RPC 2.0 and MCP protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Parse error: invalid JSON")]
    ParseError,

    #[error("Invalid request: {0}")]
    InvalidRequest(Cow<'static, str>),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(Cow<'static, str>),

    #[error("Internal error: {0}")]
    InternalError(Cow<'static, str>),

    #[error("{message}")]
    Rejected { status: u16, message: String },
}

impl ProtocolError {
    /// Returns the JSON-RPC 2.0 error code.
    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest(_) => -32600,
            Self::MethodNotFound(_) => -32601,
            Self::InvalidParams(_) => -32602,
            Self::InternalError(_) => -32603,
            Self::Rejected { .. } => -32001,
        }
    }
}

/// Admission and validation failures.
///
/// Every variant's message is safe to return to the caller: none of them
/// embed key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("API key is required")]
    MissingApiKey,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Query must be a non-empty string")]
    EmptyStatement,

    #[error("Query type not allowed. Allowed types: {allowed}")]
    DisallowedStatementType { allowed: String },

    #[error("Query contains potentially dangerous patterns")]
    DangerousPattern { pattern: String },

    #[error("Query execution timed out")]
    QueryTimeout,

    #[error("Query execution failed: {0}")]
    RemoteExecutionFailure(String),

    #[error("Table name must be provided")]
    MissingTableName,

    #[error("Failed to get {what}: {reason}")]
    SchemaLookupFailure { what: &'static str, reason: String },
}

impl GatewayError {
    pub fn kind(&self) -> GatewayErrorKind {
        match self {
            Self::MissingApiKey => GatewayErrorKind::MissingApiKey,
            Self::InvalidApiKey => GatewayErrorKind::InvalidApiKey,
            Self::RateLimitExceeded => GatewayErrorKind::RateLimitExceeded,
            Self::EmptyStatement => GatewayErrorKind::EmptyStatement,
            Self::DisallowedStatementType { .. } => GatewayErrorKind::DisallowedStatementType,
            Self::DangerousPattern { .. } => GatewayErrorKind::DangerousPattern,
            Self::QueryTimeout => GatewayErrorKind::QueryTimeout,
            Self::RemoteExecutionFailure(_) => GatewayErrorKind::RemoteExecutionFailure,
            Self::MissingTableName => GatewayErrorKind::MissingTableName,
            Self::SchemaLookupFailure { .. } => GatewayErrorKind::SchemaLookupFailure,
        }
    }
}

/// Fieldless discriminant of [`GatewayError`], used as a status-mapping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayErrorKind {
    MissingApiKey,
    InvalidApiKey,
    RateLimitExceeded,
    EmptyStatement,
    DisallowedStatementType,
    DangerousPattern,
    QueryTimeout,
    RemoteExecutionFailure,
    MissingTableName,
    SchemaLookupFailure,
}

/// Failures reported by the remote PostgREST endpoint.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {0}")]
    MissingField(Cow<'static, str>),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: Cow<'static, str>,
        message: Cow<'static, str>,
    },
}

/// Tool execution errors.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

/// Result type alias for McpError.
pub type Result<T> = std::result::Result<T, McpError>;

/// Result type alias for ProtocolError.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Result type alias for GatewayError.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Result type alias for RemoteError.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_codes() {
        assert_eq!(ProtocolError::ParseError.code(), -32700);
        assert_eq!(ProtocolError::InvalidRequest("test".into()).code(), -32600);
        assert_eq!(ProtocolError::MethodNotFound("test".into()).code(), -32601);
        assert_eq!(ProtocolError::InvalidParams("test".into()).code(), -32602);
        assert_eq!(ProtocolError::InternalError("test".into()).code(), -32603);
        assert_eq!(
            ProtocolError::Rejected {
                status: 401,
                message: "Invalid API key".into()
            }
            .code(),
            -32001
        );
    }

    #[test]
    fn test_gateway_messages() {
        assert_eq!(GatewayError::InvalidApiKey.to_string(), "Invalid API key");
        assert_eq!(
            GatewayError::DisallowedStatementType {
                allowed: "SELECT, WITH".into()
            }
            .to_string(),
            "Query type not allowed. Allowed types: SELECT, WITH"
        );
        assert_eq!(
            GatewayError::SchemaLookupFailure {
                what: "table columns",
                reason: "boom".into()
            }
            .to_string(),
            "Failed to get table columns: boom"
        );
    }

    #[test]
    fn test_error_conversion() {
        let gateway_error = GatewayError::RateLimitExceeded;
        let mcp_error: McpError = gateway_error.into();
        assert!(matches!(mcp_error, McpError::Gateway(_)));
        assert_eq!(mcp_error.to_string(), "Rate limit exceeded");
    }
}
