//! Connectivity, name lookup and cache administration tools

use psa_core::{CacheScope, EntityKind, ResolutionLayer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_args, ToolClass, ToolDefinition};
use crate::error::McpResult;

pub const TEST_CONNECTION: &str = "psa_test_connection";
pub const RESOLVE_NAMES: &str = "psa_resolve_names";
pub const CACHE_STATS: &str = "psa_cache_stats";
pub const CLEAR_CACHE: &str = "psa_clear_cache";

/// psa_test_connection tool definition
pub fn test_connection_tool() -> ToolDefinition {
    ToolDefinition::new(
        TEST_CONNECTION,
        ToolClass::Test,
        "Test Connection",
        "Check that the PSA platform is reachable.",
        json!({ "type": "object", "properties": {} }),
    )
}

/// psa_resolve_names tool definition
pub fn resolve_names_tool() -> ToolDefinition {
    ToolDefinition::new(
        RESOLVE_NAMES,
        ToolClass::ReadOnly,
        "Resolve Names",
        "Turn entity IDs into display names. Unknown IDs come back as placeholders with found=false.",
        json!({
            "type": "object",
            "required": ["kind", "ids"],
            "properties": {
                "kind": { "type": "string", "description": "Entity kind, e.g. \"company\" or \"resources\"" },
                "ids": { "type": "array", "items": { "type": "integer" } }
            }
        }),
    )
}

/// psa_cache_stats tool definition
pub fn cache_stats_tool() -> ToolDefinition {
    ToolDefinition::new(
        CACHE_STATS,
        ToolClass::ReadOnly,
        "Cache Statistics",
        "Show name cache occupancy, hit counters and the metadata snapshot state.",
        json!({ "type": "object", "properties": {} }),
    )
}

/// psa_clear_cache tool definition
pub fn clear_cache_tool() -> ToolDefinition {
    ToolDefinition::new(
        CLEAR_CACHE,
        ToolClass::Update,
        "Clear Cache",
        "Drop cached data so the next request refetches it.",
        json!({
            "type": "object",
            "properties": {
                "scope": {
                    "type": "string",
                    "description": "all (default), names, names:<kind> or metadata"
                }
            }
        }),
    )
}

/// Input for psa_resolve_names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveNamesInput {
    pub kind: String,
    pub ids: Vec<i64>,
}

/// Input for psa_clear_cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClearCacheInput {
    #[serde(default)]
    pub scope: Option<String>,
}

pub(crate) async fn handle_test_connection(layer: &ResolutionLayer) -> McpResult<Value> {
    let status = layer.test_connection().await;
    Ok(serde_json::to_value(status)?)
}

pub(crate) async fn handle_resolve_names(layer: &ResolutionLayer, arguments: Value) -> McpResult<Value> {
    let input: ResolveNamesInput = parse_args(arguments)?;
    let kind: EntityKind = input.kind.parse()?;

    let resolved = layer.resolve_names(kind, input.ids).await;
    let names: Vec<Value> = resolved
        .into_iter()
        .map(|(id, value)| json!({ "id": id, "displayName": value.display_name, "found": value.found }))
        .collect();

    Ok(json!({ "kind": kind, "names": names }))
}

pub(crate) async fn handle_cache_stats(layer: &ResolutionLayer) -> McpResult<Value> {
    Ok(serde_json::to_value(layer.cache_stats().await)?)
}

pub(crate) async fn handle_clear_cache(layer: &ResolutionLayer, arguments: Value) -> McpResult<Value> {
    let input: ClearCacheInput = parse_args(arguments)?;
    let scope = match input.scope.as_deref() {
        Some(scope) => scope.parse()?,
        None => CacheScope::All,
    };

    Ok(serde_json::to_value(layer.clear_cache(scope).await)?)
}
