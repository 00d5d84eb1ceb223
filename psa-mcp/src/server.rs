//! MCP Server protocol implementation
//!
//! This module handles the MCP JSON-RPC protocol over stdio.

use std::sync::Arc;

use psa_core::ResolutionLayer;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{McpError, McpResult, RpcError};
use crate::tools::{self, ToolCall, ToolDefinition, ToolResult};
use crate::{SERVER_INSTRUCTIONS, SERVER_NAME, SERVER_VERSION};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP JSON-RPC request
#[derive(Debug, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// MCP JSON-RPC response
#[derive(Debug, Serialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl McpResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Option<Value>, err: &McpError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(err.to_rpc_error()),
        }
    }
}

/// Tool server over one resolution layer
pub struct PsaMcpServer {
    layer: Arc<ResolutionLayer>,
    tools: Vec<ToolDefinition>,
}

impl PsaMcpServer {
    pub fn new(layer: Arc<ResolutionLayer>) -> Self {
        let tools = tools::get_tool_definitions(layer.pagination());
        Self { layer, tools }
    }

    pub fn layer(&self) -> &Arc<ResolutionLayer> {
        &self.layer
    }

    /// Tools advertised by `tools/list`
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Run the MCP server over stdio
    pub async fn run_stdio(&self) -> McpResult<()> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC until the input closes
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> McpResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if let Some(response) = self.handle_line(&line).await {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        tracing::info!("Input closed, shutting down");
        Ok(())
    }

    /// Handle one line of input, returning the serialized response if any
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        if line.trim().is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<McpRequest>(line) {
            Ok(request) => self.handle_request(request).await?,
            Err(e) => {
                tracing::warn!("Unparseable request: {}", e);
                McpResponse::failure(None, &McpError::Parse(e))
            }
        };

        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!("Failed to serialize response: {}", e);
                None
            }
        }
    }

    /// Handle an MCP request; notifications get no response
    pub async fn handle_request(&self, request: McpRequest) -> Option<McpResponse> {
        if request.id.is_none() && request.method.starts_with("notifications/") {
            tracing::debug!(method = %request.method, "Notification received");
            return None;
        }

        let result = match request.method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.handle_tools_list()),
            "tools/call" => self.handle_tools_call(request.params).await,
            other => Err(McpError::MethodNotFound(other.to_string())),
        };

        Some(match result {
            Ok(value) => McpResponse::success(request.id, value),
            Err(e) => McpResponse::failure(request.id, &e),
        })
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            },
            "capabilities": {
                "tools": {}
            },
            "instructions": SERVER_INSTRUCTIONS
        })
    }

    fn handle_tools_list(&self) -> Value {
        json!({ "tools": self.tools })
    }

    async fn handle_tools_call(&self, params: Value) -> McpResult<Value> {
        let call: ToolCall = serde_json::from_value(params)
            .map_err(|e| McpError::InvalidParams(format!("tools/call: {}", e)))?;

        let result = self.call_tool(call).await?;
        Ok(serde_json::to_value(result)?)
    }

    /// Run a tool
    ///
    /// Unknown tools are a protocol error; failures inside a tool come back as
    /// an error result so the agent can read and correct them.
    pub async fn call_tool(&self, call: ToolCall) -> McpResult<ToolResult> {
        tracing::debug!(tool = %call.name, "Tool call");

        match tools::dispatch(&self.layer, &call.name, call.arguments).await {
            Ok(value) => Ok(ToolResult::json(&value)),
            Err(e @ McpError::UnknownTool(_)) => Err(e),
            Err(e) => {
                tracing::info!(tool = %call.name, code = e.error_code(), "Tool call failed: {}", e);
                Ok(ToolResult::error(&e))
            }
        }
    }
}
