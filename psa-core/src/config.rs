//! Configuration for the resolution layer

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::error::{ResolveError, ResolveResult};
use crate::pagination::PagePolicy;

/// Main resolver configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Name resolution cache
    #[serde(default)]
    pub names: NameCacheConfig,

    /// Metadata validation cache
    #[serde(default)]
    pub metadata: MetadataCacheConfig,

    /// Pagination policies
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Write validation limits
    #[serde(default)]
    pub validation: ValidationConfig,
}

fn default_true() -> bool { true }

/// Longest TTL accepted for any cache (30 days)
pub const MAX_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;

impl ResolverConfig {
    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> ResolveResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: ResolverConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PSA_*` environment overrides
    pub fn apply_env(mut self) -> ResolveResult<Self> {
        if let Some(ttl) = env_u64("PSA_NAME_CACHE_TTL_SECS")? {
            self.names.ttl_seconds = ttl;
        }
        if let Some(ttl) = env_u64("PSA_METADATA_TTL_SECS")? {
            self.metadata.ttl_seconds = ttl;
        }
        if let Some(calls) = env_u64("PSA_MAX_UNLIMITED_CALLS")? {
            self.pagination.max_unlimited_calls = calls as usize;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> ResolveResult<()> {
        for (field, secs) in [
            ("names.ttl_seconds", self.names.ttl_seconds),
            ("metadata.ttl_seconds", self.metadata.ttl_seconds),
            ("metadata.degraded_ttl_seconds", self.metadata.degraded_ttl_seconds),
        ] {
            if secs > MAX_TTL_SECONDS {
                return Err(ResolveError::Config {
                    reason: format!("{} is {}; maximum is {} (30 days)", field, secs, MAX_TTL_SECONDS),
                });
            }
        }
        if self.names.enabled && self.names.max_entries == 0 {
            return Err(ResolveError::Config {
                reason: "names.max_entries must be at least 1".to_string(),
            });
        }
        if self.pagination.max_unlimited_calls == 0 {
            return Err(ResolveError::Config {
                reason: "pagination.max_unlimited_calls must be at least 1".to_string(),
            });
        }
        for (kind, policy) in &self.pagination.overrides {
            policy.check().map_err(|reason| ResolveError::Config {
                reason: format!("page policy for {}: {}", kind, reason),
            })?;
        }
        if self.validation.allowed_publish_levels.is_empty() {
            return Err(ResolveError::Config {
                reason: "validation.allowed_publish_levels must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn env_u64(name: &str) -> ResolveResult<Option<u64>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ResolveError::Config {
                reason: format!("{} must be a non-negative integer, got '{}'", name, value),
            }),
        Err(_) => Ok(None),
    }
}

/// Name resolution cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameCacheConfig {
    /// Whether resolved names are cached at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entry TTL in seconds
    #[serde(default = "default_name_ttl")]
    pub ttl_seconds: u64,

    /// Entries held across all kinds before the oldest are evicted
    #[serde(default = "default_max_names")]
    pub max_entries: usize,
}

fn default_name_ttl() -> u64 { 1800 }
fn default_max_names() -> usize { 10_000 }

impl Default for NameCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 1800,
            max_entries: 10_000,
        }
    }
}

/// Metadata validation cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataCacheConfig {
    /// Snapshot TTL in seconds
    #[serde(default = "default_metadata_ttl")]
    pub ttl_seconds: u64,

    /// TTL of the built-in fallback snapshot, so the upstream is retried sooner
    #[serde(default = "default_degraded_ttl")]
    pub degraded_ttl_seconds: u64,
}

fn default_metadata_ttl() -> u64 { 900 }
fn default_degraded_ttl() -> u64 { 60 }

impl Default for MetadataCacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 900,
            degraded_ttl_seconds: 60,
        }
    }
}

/// Pagination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Hard ceiling on upstream calls for an unlimited request
    #[serde(default = "default_max_unlimited_calls")]
    pub max_unlimited_calls: usize,

    /// Per-kind policy overrides on top of the built-in table
    #[serde(default)]
    pub overrides: BTreeMap<EntityKind, PagePolicy>,
}

fn default_max_unlimited_calls() -> usize { 100 }

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_unlimited_calls: 100,
            overrides: BTreeMap::new(),
        }
    }
}

/// Write validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum title length in characters
    #[serde(default = "default_max_title")]
    pub max_title_length: usize,

    /// Maximum ticket description length in characters
    #[serde(default = "default_max_description")]
    pub max_description_length: usize,

    /// Maximum note body length in characters
    #[serde(default = "default_max_note")]
    pub max_note_length: usize,

    /// Publish levels a note may be created with
    #[serde(default = "default_publish_levels")]
    pub allowed_publish_levels: Vec<i64>,
}

fn default_max_title() -> usize { 255 }
fn default_max_description() -> usize { 8000 }
fn default_max_note() -> usize { 32000 }
fn default_publish_levels() -> Vec<i64> { vec![1, 2, 3] }

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_title_length: 255,
            max_description_length: 8000,
            max_note_length: 32000,
            allowed_publish_levels: vec![1, 2, 3],
        }
    }
}
