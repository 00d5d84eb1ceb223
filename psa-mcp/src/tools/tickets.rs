//! Ticket write tools and the enumerations they validate against

use psa_core::{EntityKind, NoteRequest, ResolutionLayer, TicketUpdateRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_args, ToolClass, ToolDefinition};
use crate::error::{McpError, McpResult};

pub const UPDATE_TICKET: &str = "psa_update_ticket";
pub const CREATE_TICKET_NOTE: &str = "psa_create_ticket_note";
pub const CREATE_PROJECT_NOTE: &str = "psa_create_project_note";
pub const CREATE_COMPANY_NOTE: &str = "psa_create_company_note";
pub const LIST_TICKET_STATUSES: &str = "psa_list_ticket_statuses";
pub const LIST_TICKET_PRIORITIES: &str = "psa_list_ticket_priorities";

/// psa_update_ticket tool definition
pub fn update_ticket_tool() -> ToolDefinition {
    ToolDefinition::new(
        UPDATE_TICKET,
        ToolClass::Update,
        "Update Ticket",
        "Update a ticket. Status, priority and assignee are checked against the tenant's current values; \
         every problem is reported at once with the valid choices.",
        json!({
            "type": "object",
            "required": ["ticketID"],
            "properties": {
                "ticketID": { "type": "integer", "description": "Ticket to update" },
                "title": { "type": "string", "description": "New title" },
                "description": { "type": "string", "description": "New description" },
                "status": { "type": "integer", "description": "Status ID (see psa_list_ticket_statuses)" },
                "priority": { "type": "integer", "description": "Priority ID (see psa_list_ticket_priorities)" },
                "assignedResourceID": { "type": "integer", "description": "Active resource to assign" },
                "dueDateTime": { "type": "string", "format": "date-time", "description": "Due date (RFC 3339)" }
            }
        }),
    )
}

fn note_tool(name: &str, title: &str, parent: &str) -> ToolDefinition {
    ToolDefinition::new(
        name,
        ToolClass::Create,
        title,
        format!("Add a note to a {}. Line endings are normalized and surrounding whitespace trimmed.", parent),
        json!({
            "type": "object",
            "required": ["parentID", "description"],
            "properties": {
                "parentID": { "type": "integer", "description": format!("ID of the {}", parent) },
                "title": { "type": "string", "description": "Note title" },
                "description": { "type": "string", "description": "Note body" },
                "publish": { "type": "integer", "description": "Visibility level" },
                "noteType": { "type": "integer", "description": "Note type ID" }
            }
        }),
    )
}

/// psa_create_ticket_note tool definition
pub fn create_ticket_note_tool() -> ToolDefinition {
    note_tool(CREATE_TICKET_NOTE, "Create Ticket Note", "ticket")
}

/// psa_create_project_note tool definition
pub fn create_project_note_tool() -> ToolDefinition {
    note_tool(CREATE_PROJECT_NOTE, "Create Project Note", "project")
}

/// psa_create_company_note tool definition
pub fn create_company_note_tool() -> ToolDefinition {
    note_tool(CREATE_COMPANY_NOTE, "Create Company Note", "company")
}

/// psa_list_ticket_statuses tool definition
pub fn list_ticket_statuses_tool() -> ToolDefinition {
    ToolDefinition::new(
        LIST_TICKET_STATUSES,
        ToolClass::ReadOnly,
        "List Ticket Statuses",
        "List the ticket statuses valid for this tenant.",
        json!({ "type": "object", "properties": {} }),
    )
}

/// psa_list_ticket_priorities tool definition
pub fn list_ticket_priorities_tool() -> ToolDefinition {
    ToolDefinition::new(
        LIST_TICKET_PRIORITIES,
        ToolClass::ReadOnly,
        "List Ticket Priorities",
        "List the ticket priorities valid for this tenant.",
        json!({ "type": "object", "properties": {} }),
    )
}

/// Input for the note tools
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInput {
    #[serde(rename = "parentID", alias = "parentId")]
    pub parent_id: i64,
    #[serde(default)]
    pub title: Option<String>,
    pub description: String,
    #[serde(default)]
    pub publish: Option<i64>,
    #[serde(default)]
    pub note_type: Option<i64>,
}

pub(crate) async fn handle_update_ticket(layer: &ResolutionLayer, arguments: Value) -> McpResult<Value> {
    let request: TicketUpdateRequest = parse_args(arguments)?;
    let written = layer.apply_ticket_update(&request).await?;

    Ok(json!({
        "updated": true,
        "ticketID": written.id,
        "fields": written.payload,
    }))
}

pub(crate) async fn handle_create_note(layer: &ResolutionLayer, tool: &str, arguments: Value) -> McpResult<Value> {
    let kind = match tool {
        CREATE_TICKET_NOTE => EntityKind::TicketNote,
        CREATE_PROJECT_NOTE => EntityKind::ProjectNote,
        CREATE_COMPANY_NOTE => EntityKind::CompanyNote,
        other => return Err(McpError::UnknownTool(other.to_string())),
    };

    let input: NoteInput = parse_args(arguments)?;
    let request = NoteRequest {
        kind,
        parent_id: input.parent_id,
        title: input.title,
        description: input.description,
        publish: input.publish,
        note_type: input.note_type,
    };

    let written = layer.create_note(&request).await?;

    Ok(json!({
        "created": true,
        "kind": written.kind,
        "noteID": written.id,
        "fields": written.payload,
    }))
}

pub(crate) async fn handle_list_statuses(layer: &ResolutionLayer) -> McpResult<Value> {
    let snapshot = layer.metadata_snapshot().await;
    let statuses: Vec<Value> = snapshot
        .statuses
        .iter()
        .map(|(id, name)| json!({ "id": id, "name": name }))
        .collect();

    Ok(json!({ "statuses": statuses, "degraded": snapshot.degraded }))
}

pub(crate) async fn handle_list_priorities(layer: &ResolutionLayer) -> McpResult<Value> {
    let snapshot = layer.metadata_snapshot().await;
    let priorities: Vec<Value> = snapshot
        .priorities
        .iter()
        .map(|(id, name)| json!({ "id": id, "name": name }))
        .collect();

    Ok(json!({ "priorities": priorities, "degraded": snapshot.degraded }))
}
