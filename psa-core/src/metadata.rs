//! Metadata validation cache
//!
//! Holds a snapshot of tenant-specific enumerations (ticket statuses,
//! priorities, assignable resources) used to validate writes before they reach
//! the upstream.
//!
//! ## Lifecycle
//!
//! ```text
//!   (empty) ──first use──► fetch ──ok──► snapshot
//!                            │
//!                            └─fail──► built-in default (degraded, short TTL)
//!
//!   snapshot ──expired──► fetch ──ok──► new snapshot (whole swap)
//!                           │
//!                           └─fail──► keep previous snapshot, back off
//! ```
//!
//! Fetches are single-flight: concurrent callers queue on one async mutex and
//! re-check the snapshot once they hold it, so only the first issues upstream
//! calls. Readers clone an `Arc` to the current snapshot and never see a
//! half-built one.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::cache::ttl_from_secs;
use crate::clock::Clock;
use crate::config::MetadataCacheConfig;
use crate::entity::EnumerationKind;
use crate::error::ResolveResult;
use crate::upstream::{EnumerationEntry, UpstreamClient};

/// A resource that may be assigned work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub name: String,
    pub is_active: bool,
}

/// Whether an assignee ID may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Active,
    Inactive,
    Unknown,
}

/// Immutable bundle of enumeration data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    /// Valid ticket statuses
    pub statuses: BTreeMap<i64, String>,
    /// Valid ticket priorities
    pub priorities: BTreeMap<i64, String>,
    /// Known resources, active or not
    pub resources: BTreeMap<i64, ResourceInfo>,
    /// When the snapshot was built
    pub fetched_at: DateTime<Utc>,
    /// Freshness window in seconds
    pub ttl_seconds: i64,
    /// Built from defaults because the upstream was unreachable
    pub degraded: bool,
}

impl MetadataSnapshot {
    /// Build from fetched enumerations
    pub fn from_enumerations(
        statuses: Vec<EnumerationEntry>,
        priorities: Vec<EnumerationEntry>,
        resources: Vec<EnumerationEntry>,
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let usable = |entries: Vec<EnumerationEntry>| -> BTreeMap<i64, String> {
            entries
                .into_iter()
                .filter(|e| e.is_active != Some(false))
                .map(|e| (e.id, e.name))
                .collect()
        };

        Self {
            statuses: usable(statuses),
            priorities: usable(priorities),
            resources: resources
                .into_iter()
                .map(|e| {
                    (
                        e.id,
                        ResourceInfo {
                            name: e.name,
                            is_active: e.is_active.unwrap_or(true),
                        },
                    )
                })
                .collect(),
            fetched_at,
            ttl_seconds: ttl.num_seconds(),
            degraded: false,
        }
    }

    /// Conventional values used when the upstream cannot be reached on first use
    pub fn builtin_default(fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        let named = |pairs: &[(i64, &str)]| -> BTreeMap<i64, String> {
            pairs.iter().map(|(id, name)| (*id, name.to_string())).collect()
        };

        Self {
            statuses: named(&[
                (1, "New"),
                (5, "Complete"),
                (7, "Waiting Customer"),
                (8, "In Progress"),
                (9, "Waiting Materials"),
                (10, "Dispatched"),
                (11, "Escalate"),
                (12, "Waiting Vendor"),
            ]),
            priorities: named(&[(1, "High"), (2, "Medium"), (3, "Low"), (4, "Critical")]),
            resources: BTreeMap::new(),
            fetched_at,
            ttl_seconds: ttl.num_seconds(),
            degraded: true,
        }
    }

    /// `now - fetched_at > ttl`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at > Duration::seconds(self.ttl_seconds)
    }

    pub fn is_valid_status(&self, id: i64) -> bool {
        self.statuses.contains_key(&id)
    }

    pub fn is_valid_priority(&self, id: i64) -> bool {
        self.priorities.contains_key(&id)
    }

    /// Active, inactive, or not known at all
    pub fn resource_status(&self, id: i64) -> ResourceStatus {
        match self.resources.get(&id) {
            Some(info) if info.is_active => ResourceStatus::Active,
            Some(_) => ResourceStatus::Inactive,
            None => ResourceStatus::Unknown,
        }
    }

    /// Valid statuses as `"id (name)"`, ordered by ID
    pub fn describe_valid_statuses(&self) -> Vec<String> {
        describe(&self.statuses)
    }

    /// Valid priorities as `"id (name)"`, ordered by ID
    pub fn describe_valid_priorities(&self) -> Vec<String> {
        describe(&self.priorities)
    }

    /// Assignable resources as `"id (name)"`, ordered by ID
    pub fn describe_active_resources(&self) -> Vec<String> {
        self.resources
            .iter()
            .filter(|(_, info)| info.is_active)
            .map(|(id, info)| format!("{} ({})", id, info.name))
            .collect()
    }

    /// Number of resources that can currently be assigned
    pub fn active_resource_count(&self) -> usize {
        self.resources.values().filter(|r| r.is_active).count()
    }
}

fn describe(values: &BTreeMap<i64, String>) -> Vec<String> {
    values
        .iter()
        .map(|(id, name)| format!("{} ({})", id, name))
        .collect()
}

/// Metadata cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataStats {
    pub initialized: bool,
    pub degraded: bool,
    pub statuses: usize,
    pub priorities: usize,
    pub resources: usize,
    pub active_resources: usize,
    /// Age of the current snapshot in seconds
    pub age_secs: Option<i64>,
    /// Successful snapshot fetches
    pub refreshes: u64,
    /// Failed snapshot fetches
    pub refresh_failures: u64,
}

/// TTL-bound snapshot of tenant enumerations with single-flight refresh
pub struct MetadataValidationCache {
    upstream: Arc<dyn UpstreamClient>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    degraded_ttl: Duration,
    snapshot: RwLock<Option<Arc<MetadataSnapshot>>>,
    /// Earliest time a failed refresh may be retried
    retry_not_before: RwLock<Option<DateTime<Utc>>>,
    refresh_lock: Mutex<()>,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
}

impl MetadataValidationCache {
    /// Create an empty cache; nothing is fetched until first use
    pub fn new(upstream: Arc<dyn UpstreamClient>, clock: Arc<dyn Clock>, config: &MetadataCacheConfig) -> Self {
        Self {
            upstream,
            clock,
            ttl: ttl_from_secs(config.ttl_seconds),
            degraded_ttl: ttl_from_secs(config.degraded_ttl_seconds),
            snapshot: RwLock::new(None),
            retry_not_before: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refreshes: AtomicU64::new(0),
            refresh_failures: AtomicU64::new(0),
        }
    }

    /// Current snapshot without triggering a fetch
    pub fn current(&self) -> Option<Arc<MetadataSnapshot>> {
        self.snapshot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Populate the snapshot if this is the first use
    pub async fn ensure_initialized(&self) -> Arc<MetadataSnapshot> {
        if let Some(snapshot) = self.current() {
            return snapshot;
        }
        self.load(|current, _| current.is_none()).await
    }

    /// Populate or refresh the snapshot if missing or past its TTL
    pub async fn refresh_if_expired(&self) -> Arc<MetadataSnapshot> {
        let now = self.clock.now();
        if let Some(snapshot) = self.current() {
            if !self.needs_refresh(&snapshot, now) {
                return snapshot;
            }
        }
        self.load(|current, now| match current {
            Some(snapshot) => self.needs_refresh(snapshot, now),
            None => true,
        })
        .await
    }

    fn needs_refresh(&self, snapshot: &MetadataSnapshot, now: DateTime<Utc>) -> bool {
        if !snapshot.is_expired(now) {
            return false;
        }
        let retry_not_before = *self.retry_not_before.read().unwrap_or_else(|e| e.into_inner());
        retry_not_before.map_or(true, |at| now >= at)
    }

    /// Single-flight fetch; `should_fetch` is re-evaluated once the lock is held
    async fn load<F>(&self, should_fetch: F) -> Arc<MetadataSnapshot>
    where
        F: Fn(Option<&MetadataSnapshot>, DateTime<Utc>) -> bool,
    {
        let _guard = self.refresh_lock.lock().await;

        // Another caller may have finished the fetch while we waited
        let existing = self.current();
        if !should_fetch(existing.as_deref(), self.clock.now()) {
            if let Some(snapshot) = existing {
                return snapshot;
            }
        }

        match self.fetch_snapshot().await {
            Ok(snapshot) => {
                self.refreshes.fetch_add(1, Ordering::Relaxed);
                *self.retry_not_before.write().unwrap_or_else(|e| e.into_inner()) = None;
                tracing::debug!(
                    statuses = snapshot.statuses.len(),
                    priorities = snapshot.priorities.len(),
                    resources = snapshot.resources.len(),
                    "Metadata snapshot refreshed"
                );
                self.swap(snapshot)
            }
            Err(e) => {
                self.refresh_failures.fetch_add(1, Ordering::Relaxed);
                let now = self.clock.now();
                match existing {
                    Some(previous) => {
                        let retry_at = now
                            .checked_add_signed(self.degraded_ttl)
                            .unwrap_or(DateTime::<Utc>::MAX_UTC);
                        *self.retry_not_before.write().unwrap_or_else(|e| e.into_inner()) = Some(retry_at);
                        tracing::warn!(
                            degraded = previous.degraded,
                            "Metadata refresh failed, keeping previous snapshot: {}",
                            e
                        );
                        previous
                    }
                    None => {
                        tracing::warn!(
                            degraded = true,
                            "Metadata fetch failed on first use, falling back to built-in defaults: {}",
                            e
                        );
                        self.swap(MetadataSnapshot::builtin_default(now, self.degraded_ttl))
                    }
                }
            }
        }
    }

    /// Fetch all three enumerations; any failure fails the whole snapshot
    async fn fetch_snapshot(&self) -> ResolveResult<MetadataSnapshot> {
        let statuses = self.upstream.fetch_enumerations(EnumerationKind::Statuses).await?;
        let priorities = self.upstream.fetch_enumerations(EnumerationKind::Priorities).await?;
        let resources = self.upstream.fetch_enumerations(EnumerationKind::Resources).await?;

        Ok(MetadataSnapshot::from_enumerations(
            statuses,
            priorities,
            resources,
            self.clock.now(),
            self.ttl,
        ))
    }

    fn swap(&self, snapshot: MetadataSnapshot) -> Arc<MetadataSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Some(snapshot.clone());
        snapshot
    }

    /// Status check against the current snapshot; false before initialization
    pub fn is_valid_status(&self, id: i64) -> bool {
        self.current().is_some_and(|s| s.is_valid_status(id))
    }

    /// Priority check against the current snapshot; false before initialization
    pub fn is_valid_priority(&self, id: i64) -> bool {
        self.current().is_some_and(|s| s.is_valid_priority(id))
    }

    /// Assignee check against the current snapshot; false before initialization
    pub fn is_valid_active_resource(&self, id: i64) -> bool {
        self.current()
            .is_some_and(|s| s.resource_status(id) == ResourceStatus::Active)
    }

    /// Valid statuses as `"id (name)"`; empty before initialization
    pub fn describe_valid_statuses(&self) -> Vec<String> {
        self.current()
            .map(|s| s.describe_valid_statuses())
            .unwrap_or_default()
    }

    /// Valid priorities as `"id (name)"`; empty before initialization
    pub fn describe_valid_priorities(&self) -> Vec<String> {
        self.current()
            .map(|s| s.describe_valid_priorities())
            .unwrap_or_default()
    }

    /// Drop the snapshot so the next use fetches a new one
    pub fn invalidate(&self) {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = None;
        *self.retry_not_before.write().unwrap_or_else(|e| e.into_inner()) = None;
        tracing::debug!("Metadata snapshot invalidated");
    }

    /// Snapshot shape and refresh counters
    pub fn stats(&self) -> MetadataStats {
        let now = self.clock.now();
        let refreshes = self.refreshes.load(Ordering::Relaxed);
        let refresh_failures = self.refresh_failures.load(Ordering::Relaxed);

        match self.current() {
            Some(snapshot) => MetadataStats {
                initialized: true,
                degraded: snapshot.degraded,
                statuses: snapshot.statuses.len(),
                priorities: snapshot.priorities.len(),
                resources: snapshot.resources.len(),
                active_resources: snapshot.active_resource_count(),
                age_secs: Some((now - snapshot.fetched_at).num_seconds()),
                refreshes,
                refresh_failures,
            },
            None => MetadataStats {
                refreshes,
                refresh_failures,
                ..MetadataStats::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, name: &str, is_active: Option<bool>) -> EnumerationEntry {
        EnumerationEntry {
            id,
            name: name.to_string(),
            is_active,
        }
    }

    #[test]
    fn test_snapshot_from_enumerations() {
        let snapshot = MetadataSnapshot::from_enumerations(
            vec![entry(1, "New", None), entry(5, "Complete", Some(true)), entry(6, "Retired", Some(false))],
            vec![entry(2, "Medium", None)],
            vec![entry(10, "Dana Reyes", Some(true)), entry(11, "Sam Ortiz", Some(false)), entry(12, "Lee Park", None)],
            Utc::now(),
            Duration::minutes(15),
        );

        assert!(snapshot.is_valid_status(1));
        assert!(!snapshot.is_valid_status(6));
        assert!(snapshot.is_valid_priority(2));
        assert_eq!(snapshot.resource_status(10), ResourceStatus::Active);
        assert_eq!(snapshot.resource_status(11), ResourceStatus::Inactive);
        assert_eq!(snapshot.resource_status(12), ResourceStatus::Active);
        assert_eq!(snapshot.resource_status(99), ResourceStatus::Unknown);
        assert_eq!(snapshot.active_resource_count(), 2);
        assert_eq!(snapshot.describe_active_resources(), vec!["10 (Dana Reyes)", "12 (Lee Park)"]);
        assert!(!snapshot.degraded);
    }

    #[test]
    fn test_describe_is_ordered_by_id() {
        let snapshot = MetadataSnapshot::builtin_default(Utc::now(), Duration::minutes(1));
        let described = snapshot.describe_valid_statuses();

        assert_eq!(described[0], "1 (New)");
        assert_eq!(described[1], "5 (Complete)");
        assert!(snapshot.degraded);
        assert!(snapshot.resources.is_empty());
    }

    #[test]
    fn test_snapshot_expiry() {
        let fetched = Utc::now();
        let snapshot = MetadataSnapshot::builtin_default(fetched, Duration::minutes(15));

        assert!(!snapshot.is_expired(fetched + Duration::minutes(15)));
        assert!(snapshot.is_expired(fetched + Duration::minutes(16)));
    }
}
