//! PSA Core - remote data resolution for a PSA tool server
//!
//! Sits between a tool dispatcher and the PSA platform's API and:
//! - Turns caller page-size hints into bounded upstream fetch plans
//! - Replaces foreign-key IDs with display names from a TTL cache
//! - Validates writes against tenant enumerations before they leave the process
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     RESOLUTION LAYER                         │
//! │                                                              │
//! │  read path                          write path               │
//! │  ┌─────────────┐                   ┌─────────────┐           │
//! │  │ Pagination  │                   │  Two-layer  │           │
//! │  │  Resolver   │                   │  Validator  │           │
//! │  └──────┬──────┘                   └──────┬──────┘           │
//! │         │      ┌─────────────┐     ┌──────▼──────┐           │
//! │         │      │    Name     │     │  Metadata   │           │
//! │         │      │    Cache    │     │    Cache    │           │
//! │         │      └──────┬──────┘     └──────┬──────┘           │
//! │         └─────────────┼───────────────────┘                  │
//! │                 ┌─────▼─────┐                                │
//! │                 │ Upstream  │                                │
//! │                 │  Client   │                                │
//! │                 └───────────┘                                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use psa_core::{DirectUpstream, EntityKind, ResolutionLayer, ResolverConfig, TicketUpdateRequest};
//!
//! let upstream = Arc::new(DirectUpstream::from_json_file("fixture.json")?);
//! let layer = ResolutionLayer::new(upstream, ResolverConfig::default())?;
//!
//! // Unlimited company search, batched under the call ceiling
//! let page = layer.search(EntityKind::Company, Some(-1), serde_json::json!({})).await?;
//!
//! // Ticket update checked against live statuses before it is written
//! let mut update = TicketUpdateRequest::new(4711);
//! update.status = Some(5);
//! let written = layer.apply_ticket_update(&update).await?;
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod metadata;
pub mod names;
pub mod pagination;
pub mod upstream;
pub mod validation;

pub use cache::{CacheEntry, CacheScope};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MetadataCacheConfig, NameCacheConfig, PaginationConfig, ResolverConfig, ValidationConfig};
pub use entity::{EntityKind, EnumerationKind, RawRecord};
pub use error::{ErrorCategory, ResolveError, ResolveResult};
pub use metadata::{MetadataSnapshot, MetadataStats, MetadataValidationCache, ResourceStatus};
pub use names::{NameCacheStats, NameCacheValue, NameReference, NameResolutionCache, TICKET_NAME_REFERENCES};
pub use pagination::{EffectivePlan, PagePolicy, PageRequest, PageResult, PaginationResolver, UNLIMITED_SENTINEL};
pub use upstream::{DirectUpstream, EnumerationEntry, PageFilter, UpstreamClient, UpstreamFixture};
pub use validation::{NoteRequest, TicketUpdateRequest, TwoLayerValidator, ValidationOutcome};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Dispatcher-facing entry point wiring every component to one upstream
pub struct ResolutionLayer {
    config: ResolverConfig,
    upstream: Arc<dyn UpstreamClient>,
    pagination: PaginationResolver,
    names: Arc<NameResolutionCache>,
    metadata: Arc<MetadataValidationCache>,
    validator: TwoLayerValidator,
}

impl ResolutionLayer {
    /// Create with the system clock
    pub fn new(upstream: Arc<dyn UpstreamClient>, config: ResolverConfig) -> ResolveResult<Self> {
        Self::with_clock(upstream, Arc::new(SystemClock), config)
    }

    /// Create with a custom clock
    pub fn with_clock(
        upstream: Arc<dyn UpstreamClient>,
        clock: Arc<dyn Clock>,
        config: ResolverConfig,
    ) -> ResolveResult<Self> {
        config.validate()?;

        let pagination = PaginationResolver::with_config(&config.pagination);
        let names = Arc::new(NameResolutionCache::new(upstream.clone(), clock.clone(), &config.names));
        let metadata = Arc::new(MetadataValidationCache::new(upstream.clone(), clock.clone(), &config.metadata));
        let validator = TwoLayerValidator::new(metadata.clone(), config.validation.clone());

        tracing::debug!(clock = clock.name(), "Resolution layer created");

        Ok(Self {
            config,
            upstream,
            pagination,
            names,
            metadata,
            validator,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn pagination(&self) -> &PaginationResolver {
        &self.pagination
    }

    pub fn names(&self) -> &Arc<NameResolutionCache> {
        &self.names
    }

    pub fn metadata(&self) -> &Arc<MetadataValidationCache> {
        &self.metadata
    }

    pub fn validator(&self) -> &TwoLayerValidator {
        &self.validator
    }

    /// Search one entity kind with a page-size hint
    ///
    /// Ticket results carry company and assignee names under `_enhanced`.
    pub async fn search(
        &self,
        kind: EntityKind,
        requested_size: Option<i64>,
        filter: PageFilter,
    ) -> ResolveResult<PageResult<RawRecord>> {
        let mut page = self.resolve_and_fetch(kind, requested_size, &filter).await?;

        if kind == EntityKind::Ticket && !page.items.is_empty() {
            self.names.enhance(&mut page.items, &TICKET_NAME_REFERENCES).await;
        }

        Ok(page)
    }

    /// Plan and execute a fetch without enhancement
    pub async fn resolve_and_fetch(
        &self,
        kind: EntityKind,
        requested_size: Option<i64>,
        filter: &PageFilter,
    ) -> ResolveResult<PageResult<RawRecord>> {
        let upstream = &self.upstream;
        self.pagination
            .resolve_and_fetch(kind, requested_size, |offset, size| async move {
                upstream.fetch_page(kind, filter, offset, size).await
            })
            .await
    }

    /// Display names for a set of IDs of one kind
    pub async fn resolve_names(
        &self,
        kind: EntityKind,
        ids: impl IntoIterator<Item = i64>,
    ) -> BTreeMap<i64, NameCacheValue> {
        self.names.resolve_many(kind, ids).await
    }

    pub async fn validate_update(&self, request: &TicketUpdateRequest) -> ResolveResult<ValidationOutcome> {
        self.validator.validate_update(request).await
    }

    pub async fn validate_note(&self, request: &NoteRequest) -> ResolveResult<ValidationOutcome> {
        self.validator.validate_note(request).await
    }

    /// Validate and write a ticket update
    ///
    /// Nothing reaches the upstream unless validation passes.
    pub async fn apply_ticket_update(&self, request: &TicketUpdateRequest) -> ResolveResult<WriteOutcome> {
        let payload = self.validator.validate_update(request).await?.into_result()?;
        let id = self.upstream.write_record(EntityKind::Ticket, payload.clone()).await?;

        // Ticket labels include the title
        if request.title.is_some() {
            self.names.evict(EntityKind::Ticket, id).await;
        }

        tracing::info!(kind = %EntityKind::Ticket, id, "Ticket updated");
        Ok(WriteOutcome {
            kind: EntityKind::Ticket,
            id,
            payload,
        })
    }

    /// Validate and create a note
    pub async fn create_note(&self, request: &NoteRequest) -> ResolveResult<WriteOutcome> {
        let payload = self.validator.validate_note(request).await?.into_result()?;
        let id = self.upstream.write_record(request.kind, payload.clone()).await?;

        tracing::info!(kind = %request.kind, parent_id = request.parent_id, id, "Note created");
        Ok(WriteOutcome {
            kind: request.kind,
            id,
            payload,
        })
    }

    /// Current metadata, fetching or refreshing it first if needed
    pub async fn metadata_snapshot(&self) -> Arc<MetadataSnapshot> {
        self.metadata.refresh_if_expired().await
    }

    /// Valid statuses as `"id (name)"`
    pub async fn describe_valid_statuses(&self) -> Vec<String> {
        self.metadata_snapshot().await.describe_valid_statuses()
    }

    /// Valid priorities as `"id (name)"`
    pub async fn describe_valid_priorities(&self) -> Vec<String> {
        self.metadata_snapshot().await.describe_valid_priorities()
    }

    /// Statistics for both caches
    pub async fn cache_stats(&self) -> LayerStats {
        LayerStats {
            names: self.names.stats().await,
            metadata: self.metadata.stats(),
        }
    }

    /// Administrative clear
    pub async fn clear_cache(&self, scope: CacheScope) -> ClearSummary {
        let mut summary = ClearSummary {
            scope,
            names_removed: 0,
            metadata_cleared: false,
        };

        match scope {
            CacheScope::All => {
                summary.names_removed = self.names.invalidate(None).await;
                self.metadata.invalidate();
                summary.metadata_cleared = true;
            }
            CacheScope::Names => summary.names_removed = self.names.invalidate(None).await,
            CacheScope::NamesOf(kind) => summary.names_removed = self.names.invalidate(Some(kind)).await,
            CacheScope::Metadata => {
                self.metadata.invalidate();
                summary.metadata_cleared = true;
            }
        }

        tracing::info!(
            scope = %scope,
            names_removed = summary.names_removed,
            metadata_cleared = summary.metadata_cleared,
            "Cache cleared"
        );
        summary
    }

    /// Probe the upstream with a one-record read
    pub async fn test_connection(&self) -> ConnectionStatus {
        let started = Instant::now();
        let result = self
            .upstream
            .fetch_page(EntityKind::Company, &serde_json::json!({}), 0, 1)
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(_) => ConnectionStatus {
                connected: true,
                latency_ms,
                message: "Upstream reachable".to_string(),
                error_code: None,
            },
            Err(e) => {
                tracing::warn!(latency_ms, "Connection test failed: {}", e);
                ConnectionStatus {
                    connected: false,
                    latency_ms,
                    message: e.to_string(),
                    error_code: Some(e.error_code().to_string()),
                }
            }
        }
    }
}

/// A write that reached the upstream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOutcome {
    pub kind: EntityKind,
    pub id: i64,
    /// The sanitized payload that was sent
    pub payload: serde_json::Value,
}

/// Statistics for both caches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerStats {
    pub names: NameCacheStats,
    pub metadata: MetadataStats,
}

/// What an administrative clear removed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearSummary {
    pub scope: CacheScope,
    pub names_removed: usize,
    pub metadata_cleared: bool,
}

/// Result of a connectivity probe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    pub latency_ms: u64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}
