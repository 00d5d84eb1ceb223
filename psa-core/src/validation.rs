//! Domain validation for write requests
//!
//! Requests arrive already structurally typed. The validator checks them
//! against the current metadata snapshot, normalizes free text, and either
//! accepts with a sanitized payload or rejects with every problem it found.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::ValidationConfig;
use crate::entity::EntityKind;
use crate::error::{ResolveError, ResolveResult};
use crate::metadata::{MetadataSnapshot, MetadataValidationCache, ResourceStatus};

/// A ticket update with every mutable field optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketUpdateRequest {
    #[serde(rename = "ticketID", alias = "ticketId", alias = "id")]
    pub ticket_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(
        default,
        rename = "assignedResourceID",
        alias = "assignedResourceId",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_resource_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date_time: Option<DateTime<Utc>>,
}

impl TicketUpdateRequest {
    pub fn new(ticket_id: i64) -> Self {
        Self {
            ticket_id,
            ..Self::default()
        }
    }

    /// True when at least one mutable field is present
    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.status.is_some()
            || self.priority.is_some()
            || self.assigned_resource_id.is_some()
            || self.due_date_time.is_some()
    }
}

/// A note attached to a ticket, project, or company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRequest {
    /// One of the note kinds
    pub kind: EntityKind,
    /// ID of the ticket, project, or company the note belongs to
    #[serde(rename = "parentID", alias = "parentId")]
    pub parent_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    /// Visibility level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_type: Option<i64>,
}

impl NoteRequest {
    pub fn new(kind: EntityKind, parent_id: i64, description: impl Into<String>) -> Self {
        Self {
            kind,
            parent_id,
            title: None,
            description: description.into(),
            publish: None,
            note_type: None,
        }
    }
}

/// Field naming the note's parent in the upstream payload
fn parent_field(kind: EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::TicketNote => Some("ticketID"),
        EntityKind::ProjectNote => Some("projectID"),
        EntityKind::CompanyNote => Some("companyID"),
        _ => None,
    }
}

/// Result of one validation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub errors: Vec<String>,
    /// Only meaningful when `is_valid`
    pub sanitized_payload: Value,
}

impl ValidationOutcome {
    fn from_parts(errors: Vec<String>, payload: Map<String, Value>) -> Self {
        if errors.is_empty() {
            Self {
                is_valid: true,
                errors,
                sanitized_payload: Value::Object(payload),
            }
        } else {
            Self {
                is_valid: false,
                errors,
                sanitized_payload: Value::Null,
            }
        }
    }

    /// The sanitized payload, or `ValidationFailed` carrying every error
    pub fn into_result(self) -> ResolveResult<Value> {
        if self.is_valid {
            Ok(self.sanitized_payload)
        } else {
            Err(ResolveError::ValidationFailed { errors: self.errors })
        }
    }
}

/// Collapse CRLF and lone CR to LF, then trim
pub fn sanitize_text(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// Checks write requests against tenant metadata before they reach the upstream
pub struct TwoLayerValidator {
    metadata: Arc<MetadataValidationCache>,
    config: ValidationConfig,
}

impl TwoLayerValidator {
    pub fn new(metadata: Arc<MetadataValidationCache>, config: ValidationConfig) -> Self {
        Self { metadata, config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate a ticket update
    ///
    /// Returns `EmptyUpdateRequest` when no mutable field is present; otherwise
    /// every applicable error is collected into the outcome.
    pub async fn validate_update(&self, request: &TicketUpdateRequest) -> ResolveResult<ValidationOutcome> {
        if !request.has_changes() {
            return Err(ResolveError::EmptyUpdateRequest);
        }

        let snapshot = self.metadata.refresh_if_expired().await;
        let mut errors = Vec::new();
        let mut payload = Map::new();

        if request.ticket_id <= 0 {
            errors.push(format!("Ticket ID must be a positive integer, got {}", request.ticket_id));
        }
        payload.insert("id".into(), json!(request.ticket_id));

        if let Some(status) = request.status {
            if snapshot.is_valid_status(status) {
                payload.insert("status".into(), json!(status));
            } else {
                errors.push(format!(
                    "Invalid status {}; valid statuses: {}",
                    status,
                    snapshot.describe_valid_statuses().join(", ")
                ));
            }
        }

        if let Some(priority) = request.priority {
            if snapshot.is_valid_priority(priority) {
                payload.insert("priority".into(), json!(priority));
            } else {
                errors.push(format!(
                    "Invalid priority {}; valid priorities: {}",
                    priority,
                    snapshot.describe_valid_priorities().join(", ")
                ));
            }
        }

        if let Some(resource_id) = request.assigned_resource_id {
            match check_assignee(&snapshot, resource_id) {
                Ok(()) => {
                    payload.insert("assignedResourceID".into(), json!(resource_id));
                }
                Err(message) => errors.push(message),
            }
        }

        if let Some(title) = &request.title {
            if let Some(title) = self.check_text("Title", title, self.config.max_title_length, true, &mut errors) {
                payload.insert("title".into(), json!(title));
            }
        }

        if let Some(description) = &request.description {
            if let Some(description) =
                self.check_text("Description", description, self.config.max_description_length, false, &mut errors)
            {
                payload.insert("description".into(), json!(description));
            }
        }

        if let Some(due) = request.due_date_time {
            payload.insert("dueDateTime".into(), json!(due.to_rfc3339()));
        }

        if !errors.is_empty() {
            tracing::debug!(
                ticket_id = request.ticket_id,
                errors = errors.len(),
                degraded = snapshot.degraded,
                "Ticket update rejected"
            );
        }

        Ok(ValidationOutcome::from_parts(errors, payload))
    }

    /// Validate a note for a ticket, project, or company
    pub async fn validate_note(&self, request: &NoteRequest) -> ResolveResult<ValidationOutcome> {
        let mut errors = Vec::new();
        let mut payload = Map::new();

        match parent_field(request.kind) {
            Some(field) => {
                if request.parent_id <= 0 {
                    errors.push(format!(
                        "Parent ID must be a positive integer, got {}",
                        request.parent_id
                    ));
                }
                payload.insert(field.into(), json!(request.parent_id));
            }
            None => errors.push(format!(
                "{} is not a note kind; use Ticket Note, Project Note or Company Note",
                request.kind
            )),
        }

        if let Some(title) = &request.title {
            if let Some(title) = self.check_text("Title", title, self.config.max_title_length, true, &mut errors) {
                payload.insert("title".into(), json!(title));
            }
        }

        if let Some(description) =
            self.check_text("Note description", &request.description, self.config.max_note_length, true, &mut errors)
        {
            payload.insert("description".into(), json!(description));
        }

        if let Some(publish) = request.publish {
            if self.config.allowed_publish_levels.contains(&publish) {
                payload.insert("publish".into(), json!(publish));
            } else {
                let allowed: Vec<String> = self
                    .config
                    .allowed_publish_levels
                    .iter()
                    .map(|level| level.to_string())
                    .collect();
                errors.push(format!(
                    "Publish level {} is not allowed; allowed levels: {}",
                    publish,
                    allowed.join(", ")
                ));
            }
        }

        if let Some(note_type) = request.note_type {
            payload.insert("noteType".into(), json!(note_type));
        }

        Ok(ValidationOutcome::from_parts(errors, payload))
    }

    /// Sanitize one free-text field and enforce its limits
    fn check_text(
        &self,
        field: &str,
        raw: &str,
        max_chars: usize,
        required: bool,
        errors: &mut Vec<String>,
    ) -> Option<String> {
        let text = sanitize_text(raw);
        let length = text.chars().count();

        if required && text.is_empty() {
            errors.push(format!("{} must not be empty", field));
            return None;
        }
        if length > max_chars {
            errors.push(format!(
                "{} is {} characters; maximum is {}",
                field, length, max_chars
            ));
            return None;
        }
        Some(text)
    }
}

fn check_assignee(snapshot: &MetadataSnapshot, resource_id: i64) -> Result<(), String> {
    let problem = match snapshot.resource_status(resource_id) {
        ResourceStatus::Active => return Ok(()),
        ResourceStatus::Inactive => {
            let name = snapshot
                .resources
                .get(&resource_id)
                .map(|r| r.name.as_str())
                .unwrap_or_default();
            format!(
                "Resource {} ({}) exists but is not active and cannot be assigned",
                resource_id, name
            )
        }
        ResourceStatus::Unknown if snapshot.degraded => {
            return Err(format!(
                "Resource {} cannot be verified: the resource list is unavailable (metadata degraded)",
                resource_id
            ))
        }
        ResourceStatus::Unknown => format!("Resource {} does not exist", resource_id),
    };

    let assignable = snapshot.describe_active_resources();
    if assignable.is_empty() {
        Err(format!("{}; no resources are currently assignable", problem))
    } else {
        Err(format!("{}; assignable resources: {}", problem, assignable.join(", ")))
    }
}
