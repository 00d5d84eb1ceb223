//! Name resolution cache
//!
//! Maps `(kind, id)` foreign keys to display names with bounded staleness.
//!
//! - Read-through: absent or expired entries are fetched from the upstream
//! - Batched: one `fetch_by_ids` per `resolve_many`, covering only the misses
//! - Not-found IDs are cached too, so a dangling reference costs one lookup per TTL
//! - Upstream failures degrade to `"Unknown <Kind> (<id>)"` and are not cached
//!
//! Expiry is lazy; nothing sweeps the map in the background. The map is bounded
//! by `max_entries`: a write that would overflow it first drops expired entries,
//! then the oldest ones.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::cache::{ttl_from_secs, CacheEntry};
use crate::clock::Clock;
use crate::config::NameCacheConfig;
use crate::entity::{EntityKind, RawRecord};
use crate::upstream::UpstreamClient;

/// Cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameCacheKey {
    pub kind: EntityKind,
    pub id: i64,
}

/// Resolved label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameCacheValue {
    /// Label to show the caller
    pub display_name: String,
    /// Whether the upstream knows this ID
    pub found: bool,
}

impl NameCacheValue {
    /// Placeholder for an ID that could not be resolved
    pub fn placeholder(kind: EntityKind, id: i64) -> Self {
        Self {
            display_name: kind.unknown_label(id),
            found: false,
        }
    }
}

/// A foreign-key field to label during record enhancement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameReference {
    /// Field holding the numeric ID ("companyID")
    pub id_field: &'static str,
    /// Kind the ID refers to
    pub kind: EntityKind,
    /// Key written under `_enhanced` ("companyName")
    pub label_field: &'static str,
}

/// References labelled on ticket search results
pub const TICKET_NAME_REFERENCES: [NameReference; 2] = [
    NameReference {
        id_field: "companyID",
        kind: EntityKind::Company,
        label_field: "companyName",
    },
    NameReference {
        id_field: "assignedResourceID",
        kind: EntityKind::Resource,
        label_field: "assignedResourceName",
    },
];

/// Per-kind cache occupancy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindStats {
    /// Entries held (expired entries included until touched)
    pub count: usize,
    /// Age of the oldest entry in seconds
    pub oldest_entry_age_secs: Option<i64>,
}

/// Name cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameCacheStats {
    /// Occupancy by kind
    pub per_kind: BTreeMap<EntityKind, KindStats>,
    /// Lookups served from cache
    pub hits: u64,
    /// Lookups that needed the upstream
    pub misses: u64,
    /// Batched upstream calls issued
    pub upstream_fetches: u64,
    /// IDs answered with a placeholder because the upstream failed
    pub fallbacks: u64,
    /// Live entries dropped to stay within capacity
    pub evictions: u64,
    /// Capacity across all kinds
    pub max_entries: usize,
    /// Configured TTL in seconds
    pub ttl_seconds: i64,
}

/// Keyed TTL cache from `(kind, id)` to display name
pub struct NameResolutionCache {
    upstream: Arc<dyn UpstreamClient>,
    clock: Arc<dyn Clock>,
    enabled: bool,
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<NameCacheKey, CacheEntry<NameCacheValue>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    upstream_fetches: AtomicU64,
    fallbacks: AtomicU64,
    evictions: AtomicU64,
}

impl NameResolutionCache {
    /// Create a new cache
    pub fn new(upstream: Arc<dyn UpstreamClient>, clock: Arc<dyn Clock>, config: &NameCacheConfig) -> Self {
        Self {
            upstream,
            clock,
            enabled: config.enabled,
            ttl: ttl_from_secs(config.ttl_seconds),
            max_entries: config.max_entries,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            upstream_fetches: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Resolve a single ID
    pub async fn resolve_one(&self, kind: EntityKind, id: i64) -> NameCacheValue {
        self.resolve_many(kind, [id])
            .await
            .remove(&id)
            .unwrap_or_else(|| NameCacheValue::placeholder(kind, id))
    }

    /// Resolve a set of IDs with at most one upstream call
    ///
    /// Duplicate IDs collapse to one lookup. Never fails: IDs the upstream
    /// cannot answer for get a placeholder.
    pub async fn resolve_many(
        &self,
        kind: EntityKind,
        ids: impl IntoIterator<Item = i64>,
    ) -> BTreeMap<i64, NameCacheValue> {
        let wanted: BTreeSet<i64> = ids.into_iter().collect();
        let mut resolved = BTreeMap::new();
        if wanted.is_empty() {
            return resolved;
        }

        let now = self.clock.now();
        let mut missing = BTreeSet::new();
        {
            let entries = self.entries.read().await;
            for id in &wanted {
                match entries.get(&NameCacheKey { kind, id: *id }) {
                    Some(entry) if self.enabled && !entry.is_expired(now) => {
                        resolved.insert(*id, entry.value.clone());
                    }
                    _ => {
                        missing.insert(*id);
                    }
                }
            }
        }

        self.hits.fetch_add(resolved.len() as u64, Ordering::Relaxed);
        self.misses.fetch_add(missing.len() as u64, Ordering::Relaxed);

        if missing.is_empty() {
            tracing::debug!(kind = %kind, ids = wanted.len(), "Name lookup served from cache");
            return resolved;
        }

        self.upstream_fetches.fetch_add(1, Ordering::Relaxed);
        let fetched = match self.upstream.fetch_by_ids(kind, &missing).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    kind = %kind,
                    ids = missing.len(),
                    "Name lookup failed, using placeholders: {}",
                    e
                );
                self.fallbacks.fetch_add(missing.len() as u64, Ordering::Relaxed);
                for id in missing {
                    resolved.insert(id, NameCacheValue::placeholder(kind, id));
                }
                return resolved;
            }
        };

        let fetched_at = self.clock.now();
        let mut fresh = Vec::with_capacity(missing.len());
        for id in missing {
            let value = match fetched.get(&id) {
                Some(record) => NameCacheValue {
                    display_name: label_for(kind, id, record),
                    found: true,
                },
                None => NameCacheValue::placeholder(kind, id),
            };
            fresh.push((id, value));
        }

        tracing::debug!(
            kind = %kind,
            requested = fresh.len(),
            found = fetched.len(),
            "Name lookup fetched from upstream"
        );

        if self.enabled {
            let mut entries = self.entries.write().await;
            for (id, value) in &fresh {
                entries.insert(
                    NameCacheKey { kind, id: *id },
                    CacheEntry::new(value.clone(), fetched_at, self.ttl),
                );
            }
            self.enforce_capacity(&mut entries, fetched_at);
        }

        resolved.extend(fresh);
        resolved
    }

    /// Shrink the map back to `max_entries`, expired entries first, then oldest
    fn enforce_capacity(&self, entries: &mut HashMap<NameCacheKey, CacheEntry<NameCacheValue>>, now: DateTime<Utc>) {
        if entries.len() <= self.max_entries {
            return;
        }

        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let expired = before - entries.len();

        let overflow = entries.len().saturating_sub(self.max_entries);
        if overflow > 0 {
            let mut by_age: Vec<(DateTime<Utc>, NameCacheKey)> =
                entries.iter().map(|(key, entry)| (entry.fetched_at, *key)).collect();
            by_age.sort_unstable();
            for (_, key) in by_age.into_iter().take(overflow) {
                entries.remove(&key);
            }
            self.evictions.fetch_add(overflow as u64, Ordering::Relaxed);
        }

        tracing::debug!(expired, evicted = overflow, held = entries.len(), "Name cache trimmed to capacity");
    }

    /// Attach labels for every referenced ID under each record's `_enhanced` object
    ///
    /// Distinct IDs are collected across all records first, so each kind costs
    /// at most one upstream call no matter how many records share an ID.
    pub async fn enhance(&self, records: &mut [RawRecord], references: &[NameReference]) {
        let mut ids_by_kind: BTreeMap<EntityKind, BTreeSet<i64>> = BTreeMap::new();
        for record in records.iter() {
            for reference in references {
                if let Some(id) = record.get(reference.id_field).and_then(|v| v.as_i64()) {
                    ids_by_kind.entry(reference.kind).or_default().insert(id);
                }
            }
        }

        let mut labels: HashMap<EntityKind, BTreeMap<i64, NameCacheValue>> = HashMap::new();
        for (kind, ids) in ids_by_kind {
            labels.insert(kind, self.resolve_many(kind, ids).await);
        }

        for record in records.iter_mut() {
            let mut enhanced = serde_json::Map::new();
            for reference in references {
                let Some(id) = record.get(reference.id_field).and_then(|v| v.as_i64()) else {
                    continue;
                };
                if let Some(value) = labels.get(&reference.kind).and_then(|m| m.get(&id)) {
                    enhanced.insert(
                        reference.label_field.to_string(),
                        serde_json::Value::String(value.display_name.clone()),
                    );
                }
            }
            if enhanced.is_empty() {
                continue;
            }
            if let Some(fields) = record.as_object_mut() {
                fields.insert("_enhanced".to_string(), serde_json::Value::Object(enhanced));
            }
        }
    }

    /// Drop entries of one kind, or every entry when `kind` is `None`
    ///
    /// Returns the number of entries removed.
    pub async fn invalidate(&self, kind: Option<EntityKind>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        match kind {
            Some(kind) => entries.retain(|key, _| key.kind != kind),
            None => entries.clear(),
        }
        let removed = before - entries.len();
        let scope = kind.map(|k| k.to_string()).unwrap_or_else(|| "all".to_string());
        tracing::debug!(scope = %scope, removed, "Name cache invalidated");
        removed
    }

    /// Drop a single entry, returning whether it was present
    pub async fn evict(&self, kind: EntityKind, id: i64) -> bool {
        self.entries.write().await.remove(&NameCacheKey { kind, id }).is_some()
    }

    /// Clear the entire cache
    pub async fn clear(&self) {
        self.invalidate(None).await;
    }

    /// Occupancy and counters
    pub async fn stats(&self) -> NameCacheStats {
        let now = self.clock.now();
        let entries = self.entries.read().await;

        let mut per_kind: BTreeMap<EntityKind, KindStats> = BTreeMap::new();
        for (key, entry) in entries.iter() {
            let stats = per_kind.entry(key.kind).or_default();
            stats.count += 1;
            let age = entry.age(now).num_seconds();
            stats.oldest_entry_age_secs = Some(stats.oldest_entry_age_secs.map_or(age, |a| a.max(age)));
        }

        NameCacheStats {
            per_kind,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            upstream_fetches: self.upstream_fetches.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            max_entries: self.max_entries,
            ttl_seconds: self.ttl.num_seconds(),
        }
    }
}

/// Label for a record the upstream did return
fn label_for(kind: EntityKind, id: i64, record: &RawRecord) -> String {
    kind.display_name_of(record)
        .unwrap_or_else(|| format!("{} {}", kind.label(), id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::upstream::DirectUpstream;
    use serde_json::json;

    fn cache_with(upstream: Arc<DirectUpstream>) -> NameResolutionCache {
        NameResolutionCache::new(
            upstream,
            Arc::new(ManualClock::starting_now()),
            &NameCacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_duplicate_ids_collapse() {
        let upstream = Arc::new(DirectUpstream::new());
        upstream.insert_records(EntityKind::Company, vec![json!({"id": 1, "companyName": "Acme"})]);
        let cache = cache_with(upstream.clone());

        let result = cache.resolve_many(EntityKind::Company, vec![1, 1, 1]).await;

        assert_eq!(result.len(), 1);
        assert_eq!(result[&1].display_name, "Acme");
        assert_eq!(upstream.call_counts().fetch_by_ids, 1);
    }

    #[tokio::test]
    async fn test_record_without_label_is_still_found() {
        let upstream = Arc::new(DirectUpstream::new());
        upstream.insert_records(EntityKind::Company, vec![json!({"id": 8})]);
        let cache = cache_with(upstream);

        let value = cache.resolve_one(EntityKind::Company, 8).await;
        assert!(value.found);
        assert_eq!(value.display_name, "Company 8");
    }

    #[tokio::test]
    async fn test_empty_request_skips_upstream() {
        let upstream = Arc::new(DirectUpstream::new());
        let cache = cache_with(upstream.clone());

        let result = cache.resolve_many(EntityKind::Resource, Vec::new()).await;
        assert!(result.is_empty());
        assert_eq!(upstream.call_counts().fetch_by_ids, 0);
    }

    #[tokio::test]
    async fn test_stats_serialize_camel_case() {
        let upstream = Arc::new(DirectUpstream::new());
        let cache = cache_with(upstream);
        cache.resolve_one(EntityKind::Company, 5).await;

        let json = serde_json::to_value(cache.stats().await).unwrap();
        assert_eq!(json["perKind"]["Company"]["count"], 1);
        assert_eq!(json["perKind"]["Company"]["oldestEntryAgeSecs"], 0);
        assert_eq!(json["upstreamFetches"], 1);
        assert_eq!(json["evictions"], 0);
        assert!(json.get("per_kind").is_none());
    }
}
