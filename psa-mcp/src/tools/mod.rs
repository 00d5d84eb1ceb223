//! MCP Tool implementations
//!
//! These are the tools exposed to agents through the MCP protocol. Each
//! definition carries behaviour hints so clients can tell reads from writes.

pub mod admin;
pub mod search;
pub mod tickets;

use psa_core::{PaginationResolver, ResolutionLayer};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{McpError, McpResult};

/// Behaviour class of a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolClass {
    /// Reads upstream data
    ReadOnly,
    /// Creates a new upstream record
    Create,
    /// Changes an existing record or local state
    Update,
    /// Connectivity probe
    Test,
}

impl ToolClass {
    /// Hints for this class
    pub fn annotations(self, title: impl Into<String>) -> ToolAnnotations {
        let (read_only, idempotent) = match self {
            ToolClass::ReadOnly | ToolClass::Test => (true, true),
            ToolClass::Create => (false, false),
            ToolClass::Update => (false, true),
        };

        ToolAnnotations {
            title: title.into(),
            read_only_hint: read_only,
            destructive_hint: false,
            idempotent_hint: idempotent,
            open_world_hint: true,
        }
    }
}

/// MCP tool annotations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    pub title: String,
    pub read_only_hint: bool,
    pub destructive_hint: bool,
    pub idempotent_hint: bool,
    pub open_world_hint: bool,
}

/// Tool definition for MCP protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// Description shown to the agent
    pub description: String,

    /// JSON Schema for input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,

    /// Behaviour hints
    pub annotations: ToolAnnotations,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, class: ToolClass, title: &str, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            annotations: class.annotations(title),
        }
    }
}

/// Tool call request
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Tool call response
#[derive(Debug, Serialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl ToolResult {
    /// Successful result rendered as pretty JSON
    pub fn json(value: &Value) -> Self {
        Self {
            content: vec![ToolContent {
                content_type: "text".to_string(),
                text: serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
            }],
            is_error: None,
        }
    }

    /// Failed result carrying the error body
    pub fn error(err: &McpError) -> Self {
        let body = err.to_tool_json();
        Self {
            content: vec![ToolContent {
                content_type: "text".to_string(),
                text: serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string()),
            }],
            is_error: Some(true),
        }
    }
}

/// Every tool the server exposes
pub fn get_tool_definitions(pagination: &PaginationResolver) -> Vec<ToolDefinition> {
    let mut tools = vec![admin::test_connection_tool()];
    tools.extend(search::search_tools(pagination));
    tools.extend([
        admin::resolve_names_tool(),
        tickets::update_ticket_tool(),
        tickets::create_ticket_note_tool(),
        tickets::create_project_note_tool(),
        tickets::create_company_note_tool(),
        tickets::list_ticket_statuses_tool(),
        tickets::list_ticket_priorities_tool(),
        admin::cache_stats_tool(),
        admin::clear_cache_tool(),
    ]);
    tools
}

/// Route a tool call to its handler
///
/// `Err(UnknownTool)` means no such tool; any other error is a failed call.
pub async fn dispatch(layer: &ResolutionLayer, name: &str, arguments: Value) -> McpResult<Value> {
    if let Some(kind) = search::kind_for_tool(name) {
        return search::handle_search(layer, kind, arguments).await;
    }

    match name {
        admin::TEST_CONNECTION => admin::handle_test_connection(layer).await,
        admin::RESOLVE_NAMES => admin::handle_resolve_names(layer, arguments).await,
        admin::CACHE_STATS => admin::handle_cache_stats(layer).await,
        admin::CLEAR_CACHE => admin::handle_clear_cache(layer, arguments).await,
        tickets::UPDATE_TICKET => tickets::handle_update_ticket(layer, arguments).await,
        tickets::CREATE_TICKET_NOTE | tickets::CREATE_PROJECT_NOTE | tickets::CREATE_COMPANY_NOTE => {
            tickets::handle_create_note(layer, name, arguments).await
        }
        tickets::LIST_TICKET_STATUSES => tickets::handle_list_statuses(layer).await,
        tickets::LIST_TICKET_PRIORITIES => tickets::handle_list_priorities(layer).await,
        _ => Err(McpError::UnknownTool(name.to_string())),
    }
}

/// Deserialize tool arguments, treating a missing object as empty
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> McpResult<T> {
    let arguments = if arguments.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| McpError::InvalidParams(e.to_string()))
}
