//! Error types for the resolution layer
//!
//! Every error carries:
//! - a human-readable message
//! - a stable, upper-snake error code for programmatic handling
//! - a category used by the tool server to pick a response shape
//!
//! Read-enhancement failures (name labels, metadata used for messages) never
//! surface through this type; the caches absorb them. What remains are caller
//! errors, primary-read failures and write rejections.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::EntityKind;

/// Result type for resolution layer operations
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Caller sent something we will not act on
    Validation,
    /// Upstream asked us to slow down
    RateLimit,
    /// Upstream failed or refused the request
    External,
    /// Configuration or local infrastructure problem
    Internal,
}

/// Errors that can occur in the resolution layer
#[derive(Error, Debug)]
pub enum ResolveError {
    // ═══════════════════════════════════════════════════════════════════════
    // Caller errors (surfaced immediately, never retried)
    // ═══════════════════════════════════════════════════════════════════════

    /// Page size is negative and is not the unlimited sentinel
    #[error("Invalid page size {requested}. Use a positive number, 0 for the default, or -1 for unlimited.")]
    InvalidPageSize { requested: i64 },

    /// Unlimited pagination requested for a kind that does not allow it
    #[error("Unlimited results are not supported for {kind}. Request an explicit page size instead.")]
    UnsupportedUnlimitedPagination { kind: EntityKind },

    /// Entity kind name did not match any known kind
    #[error("Unknown entity kind: '{name}'")]
    UnknownEntityKind { name: String },

    /// Write request failed domain validation
    #[error("Validation failed: {}", errors.join("; "))]
    ValidationFailed { errors: Vec<String> },

    /// Update request carried no mutable field
    #[error("Update request contains no fields to change. Provide at least one field to update.")]
    EmptyUpdateRequest,

    // ═══════════════════════════════════════════════════════════════════════
    // Upstream errors
    // ═══════════════════════════════════════════════════════════════════════

    /// Upstream could not be reached or timed out
    #[error("Upstream unavailable while accessing {kind}: {reason}")]
    RemoteUnavailable { kind: EntityKind, reason: String },

    /// Upstream throttled the request
    #[error("Upstream rate limit reached while accessing {kind}. Wait before retrying.")]
    RemoteRateLimited {
        kind: EntityKind,
        retry_after_secs: Option<u64>,
    },

    /// Upstream refused the request
    #[error("Upstream rejected {kind} request: {reason}")]
    RemoteRejected { kind: EntityKind, reason: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Infrastructure errors
    // ═══════════════════════════════════════════════════════════════════════

    /// Configuration is invalid
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure while loading configuration or fixtures
    #[error("IO error: {message}")]
    Io { message: String },
}

impl ResolveError {
    /// Returns true if retrying later might succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ResolveError::RemoteUnavailable { .. } | ResolveError::RemoteRateLimited { .. }
        )
    }

    /// Returns true for failures that originate in the upstream system
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ResolveError::RemoteUnavailable { .. }
                | ResolveError::RemoteRateLimited { .. }
                | ResolveError::RemoteRejected { .. }
        )
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            ResolveError::InvalidPageSize { .. }
            | ResolveError::UnsupportedUnlimitedPagination { .. }
            | ResolveError::UnknownEntityKind { .. }
            | ResolveError::ValidationFailed { .. }
            | ResolveError::EmptyUpdateRequest => ErrorCategory::Validation,

            ResolveError::RemoteRateLimited { .. } => ErrorCategory::RateLimit,

            ResolveError::RemoteUnavailable { .. } | ResolveError::RemoteRejected { .. } => {
                ErrorCategory::External
            }

            ResolveError::Config { .. } | ResolveError::Json(_) | ResolveError::Io { .. } => {
                ErrorCategory::Internal
            }
        }
    }

    /// Returns the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ResolveError::InvalidPageSize { .. } => "INVALID_PAGE_SIZE",
            ResolveError::UnsupportedUnlimitedPagination { .. } => {
                "UNSUPPORTED_UNLIMITED_PAGINATION"
            }
            ResolveError::UnknownEntityKind { .. } => "UNKNOWN_ENTITY_KIND",
            ResolveError::ValidationFailed { .. } => "VALIDATION_FAILED",
            ResolveError::EmptyUpdateRequest => "EMPTY_UPDATE_REQUEST",
            ResolveError::RemoteUnavailable { .. } => "REMOTE_UNAVAILABLE",
            ResolveError::RemoteRateLimited { .. } => "REMOTE_RATE_LIMITED",
            ResolveError::RemoteRejected { .. } => "REMOTE_REJECTED",
            ResolveError::Config { .. } => "CONFIG_ERROR",
            ResolveError::Json(_) => "JSON_ERROR",
            ResolveError::Io { .. } => "IO_ERROR",
        }
    }

    /// Variant-specific details for the JSON error body
    fn details(&self) -> serde_json::Value {
        match self {
            ResolveError::InvalidPageSize { requested } => {
                serde_json::json!({ "requested": requested })
            }
            ResolveError::UnsupportedUnlimitedPagination { kind } => {
                serde_json::json!({ "kind": kind })
            }
            ResolveError::ValidationFailed { errors } => serde_json::json!({ "errors": errors }),
            ResolveError::RemoteUnavailable { kind, .. } | ResolveError::RemoteRejected { kind, .. } => {
                serde_json::json!({ "kind": kind })
            }
            ResolveError::RemoteRateLimited {
                kind,
                retry_after_secs,
            } => serde_json::json!({ "kind": kind, "retry_after_secs": retry_after_secs }),
            _ => serde_json::Value::Null,
        }
    }

    /// Render as a JSON error body
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
                "category": self.category(),
                "details": self.details(),
            }
        })
    }
}

impl From<std::io::Error> for ResolveError {
    fn from(err: std::io::Error) -> Self {
        ResolveError::Io {
            message: err.to_string(),
        }
    }
}
