//! Error types for the PSA MCP Server

use psa_core::{ErrorCategory, ResolveError};
use serde::Serialize;
use thiserror::Error;

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// Errors that can occur in the MCP server
#[derive(Error, Debug)]
pub enum McpError {
    /// Tool arguments did not match the schema
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Unknown JSON-RPC method
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Unknown tool name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Failure inside the resolution layer
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Malformed JSON on the wire
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl McpError {
    /// Get error code for the JSON-RPC protocol
    pub fn error_code(&self) -> i32 {
        match self {
            McpError::InvalidParams(_) => -32600,
            McpError::MethodNotFound(_) | McpError::UnknownTool(_) => -32601,
            McpError::Parse(_) => -32700,
            McpError::Resolve(e) if e.category() == ErrorCategory::Validation => -32600,
            McpError::Resolve(_) | McpError::Io(_) => -32603,
        }
    }

    /// Convert to a JSON-RPC error object
    ///
    /// Core errors keep their machine-readable body under `data`.
    pub fn to_rpc_error(&self) -> RpcError {
        RpcError {
            code: self.error_code(),
            message: self.to_string(),
            data: match self {
                McpError::Resolve(e) => Some(e.to_json()),
                _ => None,
            },
        }
    }

    /// Body reported inside a failed tool result
    pub fn to_tool_json(&self) -> serde_json::Value {
        match self {
            McpError::Resolve(e) => e.to_json(),
            other => serde_json::json!({
                "error": {
                    "code": other.error_code(),
                    "message": other.to_string()
                }
            }),
        }
    }
}
