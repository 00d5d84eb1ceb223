//! Entity kinds exposed by the PSA platform
//!
//! Also knows how to pull a human-readable label out of a raw upstream record,
//! which is what the name cache stores.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// Raw record as returned by the upstream API
pub type RawRecord = serde_json::Value;

/// Category of business object held by the PSA platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Company,
    Contact,
    Ticket,
    Project,
    Resource,
    Task,
    TicketNote,
    ProjectNote,
    CompanyNote,
    TicketAttachment,
    TimeEntry,
    ExpenseReport,
    Quote,
    Contract,
    Invoice,
    ConfigurationItem,
}

impl EntityKind {
    /// Every kind, in catalogue order
    pub const ALL: [EntityKind; 16] = [
        EntityKind::Company,
        EntityKind::Contact,
        EntityKind::Ticket,
        EntityKind::Project,
        EntityKind::Resource,
        EntityKind::Task,
        EntityKind::TicketNote,
        EntityKind::ProjectNote,
        EntityKind::CompanyNote,
        EntityKind::TicketAttachment,
        EntityKind::TimeEntry,
        EntityKind::ExpenseReport,
        EntityKind::Quote,
        EntityKind::Contract,
        EntityKind::Invoice,
        EntityKind::ConfigurationItem,
    ];

    /// Human-readable label ("Ticket Note")
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Company => "Company",
            EntityKind::Contact => "Contact",
            EntityKind::Ticket => "Ticket",
            EntityKind::Project => "Project",
            EntityKind::Resource => "Resource",
            EntityKind::Task => "Task",
            EntityKind::TicketNote => "Ticket Note",
            EntityKind::ProjectNote => "Project Note",
            EntityKind::CompanyNote => "Company Note",
            EntityKind::TicketAttachment => "Ticket Attachment",
            EntityKind::TimeEntry => "Time Entry",
            EntityKind::ExpenseReport => "Expense Report",
            EntityKind::Quote => "Quote",
            EntityKind::Contract => "Contract",
            EntityKind::Invoice => "Invoice",
            EntityKind::ConfigurationItem => "Configuration Item",
        }
    }

    /// Plural snake-case form used in tool names ("ticket_notes")
    pub fn plural_slug(&self) -> &'static str {
        match self {
            EntityKind::Company => "companies",
            EntityKind::Contact => "contacts",
            EntityKind::Ticket => "tickets",
            EntityKind::Project => "projects",
            EntityKind::Resource => "resources",
            EntityKind::Task => "tasks",
            EntityKind::TicketNote => "ticket_notes",
            EntityKind::ProjectNote => "project_notes",
            EntityKind::CompanyNote => "company_notes",
            EntityKind::TicketAttachment => "ticket_attachments",
            EntityKind::TimeEntry => "time_entries",
            EntityKind::ExpenseReport => "expense_reports",
            EntityKind::Quote => "quotes",
            EntityKind::Contract => "contracts",
            EntityKind::Invoice => "invoices",
            EntityKind::ConfigurationItem => "configuration_items",
        }
    }

    /// Placeholder label for an ID that could not be resolved
    pub fn unknown_label(&self, id: i64) -> String {
        format!("Unknown {} ({})", self.label(), id)
    }

    /// Extract a display name from a raw record of this kind
    ///
    /// Returns `None` when the record has no usable label field.
    pub fn display_name_of(&self, record: &RawRecord) -> Option<String> {
        let text = |field: &str| text_field(record, field);

        let name = match self {
            EntityKind::Company => text("companyName").map(str::to_string),
            EntityKind::Resource | EntityKind::Contact => {
                let parts: Vec<&str> = [text("firstName"), text("lastName")]
                    .into_iter()
                    .flatten()
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join(" "))
                }
            }
            EntityKind::Project => text("projectName").map(str::to_string),
            EntityKind::Ticket => match (text("ticketNumber"), text("title")) {
                (Some(number), Some(title)) => Some(format!("{} - {}", number, title)),
                (Some(number), None) => Some(number.to_string()),
                (None, Some(title)) => Some(title.to_string()),
                (None, None) => None,
            },
            _ => None,
        };

        name.or_else(|| text("name").or_else(|| text("title")).map(str::to_string))
    }
}

fn text_field<'a>(record: &'a RawRecord, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityKind {
    type Err = ResolveError;

    /// Accepts the variant name, the label, or the plural slug, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        EntityKind::ALL
            .into_iter()
            .find(|kind| {
                let label: String = kind
                    .label()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .map(|c| c.to_ascii_lowercase())
                    .collect();
                let plural: String = kind.plural_slug().replace('_', "");
                wanted == label || wanted == plural
            })
            .ok_or_else(|| ResolveError::UnknownEntityKind {
                name: s.to_string(),
            })
    }
}

/// Tenant-specific enumerations fetched for write validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumerationKind {
    Statuses,
    Priorities,
    Resources,
}

impl EnumerationKind {
    /// Wire name of the enumeration
    pub fn as_str(&self) -> &'static str {
        match self {
            EnumerationKind::Statuses => "statuses",
            EnumerationKind::Priorities => "priorities",
            EnumerationKind::Resources => "resources",
        }
    }

    /// Kind reported in upstream errors for this enumeration
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            EnumerationKind::Statuses | EnumerationKind::Priorities => EntityKind::Ticket,
            EnumerationKind::Resources => EntityKind::Resource,
        }
    }
}

impl fmt::Display for EnumerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
