//! Search tools, one per entity kind

use psa_core::{EntityKind, PaginationResolver, ResolutionLayer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_args, ToolClass, ToolDefinition};
use crate::error::{McpError, McpResult};

const SEARCH_PREFIX: &str = "psa_search_";

/// `psa_search_<plural>` for a kind
pub fn tool_name(kind: EntityKind) -> String {
    format!("{}{}", SEARCH_PREFIX, kind.plural_slug())
}

/// Kind searched by a tool name, if it is a search tool
pub fn kind_for_tool(name: &str) -> Option<EntityKind> {
    let slug = name.strip_prefix(SEARCH_PREFIX)?;
    EntityKind::ALL.into_iter().find(|kind| kind.plural_slug() == slug)
}

/// "ticket_notes" -> "Ticket Notes"
fn plural_title(kind: EntityKind) -> String {
    kind.plural_slug()
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Search tool definitions reflecting the effective page policies
pub fn search_tools(pagination: &PaginationResolver) -> Vec<ToolDefinition> {
    EntityKind::ALL
        .into_iter()
        .map(|kind| {
            let policy = pagination.policy(kind);
            let title = format!("Search {}", plural_title(kind));

            let size_help = if policy.unlimited_allowed {
                format!(
                    "Number of results (default {}, max {}). Use -1 to fetch every matching record.",
                    policy.default_size, policy.max_size
                )
            } else {
                format!(
                    "Number of results (default {}, max {}).",
                    policy.default_size, policy.max_size
                )
            };

            let description = match kind {
                EntityKind::Ticket => format!(
                    "{}. Results include company and assignee names under `_enhanced`.",
                    title
                ),
                _ => format!("{}. Larger requests are capped and flagged as possibly truncated.", title),
            };

            ToolDefinition::new(
                tool_name(kind),
                ToolClass::ReadOnly,
                &title,
                description,
                json!({
                    "type": "object",
                    "properties": {
                        "pageSize": {
                            "type": "integer",
                            "minimum": -1,
                            "description": size_help
                        },
                        "filter": {
                            "type": "object",
                            "description": "Field equality filter, e.g. {\"status\": 1}"
                        }
                    }
                }),
            )
        })
        .collect()
}

/// Input for the search tools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchInput {
    #[serde(default)]
    pub page_size: Option<i64>,
    #[serde(default)]
    pub filter: Option<Value>,
}

pub(crate) async fn handle_search(layer: &ResolutionLayer, kind: EntityKind, arguments: Value) -> McpResult<Value> {
    let input: SearchInput = parse_args(arguments)?;

    let filter = match input.filter {
        None | Some(Value::Null) => json!({}),
        Some(filter @ Value::Object(_)) => filter,
        Some(_) => return Err(McpError::InvalidParams("filter must be an object".to_string())),
    };

    tracing::debug!(kind = %kind, page_size = ?input.page_size, "Search requested");

    let page = layer.search(kind, input.page_size, filter).await?;
    let message = page.message();

    Ok(json!({
        "kind": kind,
        "count": page.items.len(),
        "possiblyTruncated": page.possibly_truncated,
        "callsMade": page.calls_made,
        "message": message,
        "items": page.items,
    }))
}
