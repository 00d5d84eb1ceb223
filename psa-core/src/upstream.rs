//! Upstream client for the PSA platform
//!
//! The resolution layer never talks to the network directly; it consumes an
//! [`UpstreamClient`]. `DirectUpstream` is an in-process implementation backed
//! by plain collections, used when the server runs against a fixture file and
//! throughout the tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityKind, EnumerationKind, RawRecord};
use crate::error::{ResolveError, ResolveResult};

/// Filter passed through to the upstream query unchanged
pub type PageFilter = serde_json::Value;

/// One value of a tenant-specific enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumerationEntry {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// PSA platform client interface
///
/// Each call is one bounded remote query and carries its own timeout.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Fetch one page of records
    async fn fetch_page(
        &self,
        kind: EntityKind,
        filter: &PageFilter,
        offset: usize,
        size: usize,
    ) -> ResolveResult<Vec<RawRecord>>;

    /// Bulk lookup by ID; missing IDs are simply absent from the result
    async fn fetch_by_ids(
        &self,
        kind: EntityKind,
        ids: &BTreeSet<i64>,
    ) -> ResolveResult<HashMap<i64, RawRecord>>;

    /// Fetch a tenant-specific enumeration
    async fn fetch_enumerations(
        &self,
        kind: EnumerationKind,
    ) -> ResolveResult<Vec<EnumerationEntry>>;

    /// Create or update a record, returning its ID
    async fn write_record(&self, kind: EntityKind, payload: serde_json::Value) -> ResolveResult<i64>;
}

/// Fixture file layout accepted by [`DirectUpstream::from_json_file`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamFixture {
    /// Records per entity kind
    #[serde(default)]
    pub records: BTreeMap<EntityKind, Vec<RawRecord>>,

    /// Ticket statuses
    #[serde(default)]
    pub statuses: Vec<EnumerationEntry>,

    /// Ticket priorities
    #[serde(default)]
    pub priorities: Vec<EnumerationEntry>,

    /// Assignable resources
    #[serde(default)]
    pub resources: Vec<EnumerationEntry>,
}

/// Call counters for a [`DirectUpstream`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamCallCounts {
    pub fetch_page: u64,
    pub fetch_by_ids: u64,
    pub fetch_enumerations: u64,
    pub write_record: u64,
}

/// In-process upstream backed by collections
pub struct DirectUpstream {
    data: RwLock<UpstreamFixture>,
    available: AtomicBool,
    next_id: AtomicU64,
    fetch_page_calls: AtomicU64,
    fetch_by_ids_calls: AtomicU64,
    fetch_enumerations_calls: AtomicU64,
    write_record_calls: AtomicU64,
}

impl DirectUpstream {
    /// Create an empty upstream
    pub fn new() -> Self {
        Self::from_fixture(UpstreamFixture::default())
    }

    /// Create from fixture data
    pub fn from_fixture(fixture: UpstreamFixture) -> Self {
        let max_id = fixture
            .records
            .values()
            .flatten()
            .filter_map(record_id)
            .max()
            .unwrap_or(0);

        Self {
            data: RwLock::new(fixture),
            available: AtomicBool::new(true),
            next_id: AtomicU64::new(max_id.max(0) as u64 + 1),
            fetch_page_calls: AtomicU64::new(0),
            fetch_by_ids_calls: AtomicU64::new(0),
            fetch_enumerations_calls: AtomicU64::new(0),
            write_record_calls: AtomicU64::new(0),
        }
    }

    /// Load fixture data from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> ResolveResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let fixture: UpstreamFixture = serde_json::from_str(&raw)?;
        Ok(Self::from_fixture(fixture))
    }

    /// Add records of one kind
    pub fn insert_records(&self, kind: EntityKind, records: impl IntoIterator<Item = RawRecord>) {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.records.entry(kind).or_default().extend(records);
    }

    /// Replace one enumeration
    pub fn set_enumeration(&self, kind: EnumerationKind, entries: Vec<EnumerationEntry>) {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        match kind {
            EnumerationKind::Statuses => data.statuses = entries,
            EnumerationKind::Priorities => data.priorities = entries,
            EnumerationKind::Resources => data.resources = entries,
        }
    }

    /// Simulate the platform going down or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Calls received so far
    pub fn call_counts(&self) -> UpstreamCallCounts {
        UpstreamCallCounts {
            fetch_page: self.fetch_page_calls.load(Ordering::SeqCst),
            fetch_by_ids: self.fetch_by_ids_calls.load(Ordering::SeqCst),
            fetch_enumerations: self.fetch_enumerations_calls.load(Ordering::SeqCst),
            write_record: self.write_record_calls.load(Ordering::SeqCst),
        }
    }

    fn ensure_available(&self, kind: EntityKind) -> ResolveResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ResolveError::RemoteUnavailable {
                kind,
                reason: "direct upstream marked unavailable".to_string(),
            })
        }
    }
}

impl Default for DirectUpstream {
    fn default() -> Self {
        Self::new()
    }
}

/// Numeric `id` field of a raw record
pub fn record_id(record: &RawRecord) -> Option<i64> {
    record.get("id").and_then(|v| v.as_i64())
}

/// Equality match of every filter field against the record
fn matches_filter(record: &RawRecord, filter: &PageFilter) -> bool {
    match filter.as_object() {
        Some(fields) => fields
            .iter()
            .all(|(field, expected)| match (record.get(field), expected) {
                // Null in a filter means "field unset"
                (None, serde_json::Value::Null) => true,
                (Some(actual), expected) => actual == expected,
                (None, _) => false,
            }),
        None => true,
    }
}

#[async_trait]
impl UpstreamClient for DirectUpstream {
    async fn fetch_page(
        &self,
        kind: EntityKind,
        filter: &PageFilter,
        offset: usize,
        size: usize,
    ) -> ResolveResult<Vec<RawRecord>> {
        self.fetch_page_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available(kind)?;

        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        let page = data
            .records
            .get(&kind)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| matches_filter(r, filter))
                    .skip(offset)
                    .take(size)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(page)
    }

    async fn fetch_by_ids(
        &self,
        kind: EntityKind,
        ids: &BTreeSet<i64>,
    ) -> ResolveResult<HashMap<i64, RawRecord>> {
        self.fetch_by_ids_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available(kind)?;

        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        let found = data
            .records
            .get(&kind)
            .map(|records| {
                records
                    .iter()
                    .filter_map(|r| record_id(r).map(|id| (id, r)))
                    .filter(|(id, _)| ids.contains(id))
                    .map(|(id, r)| (id, r.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(found)
    }

    async fn fetch_enumerations(
        &self,
        kind: EnumerationKind,
    ) -> ResolveResult<Vec<EnumerationEntry>> {
        self.fetch_enumerations_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available(kind.entity_kind())?;

        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        Ok(match kind {
            EnumerationKind::Statuses => data.statuses.clone(),
            EnumerationKind::Priorities => data.priorities.clone(),
            EnumerationKind::Resources => data.resources.clone(),
        })
    }

    async fn write_record(&self, kind: EntityKind, payload: serde_json::Value) -> ResolveResult<i64> {
        self.write_record_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available(kind)?;

        let serde_json::Value::Object(fields) = payload else {
            return Err(ResolveError::RemoteRejected {
                kind,
                reason: "payload must be a JSON object".to_string(),
            });
        };

        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        let records = data.records.entry(kind).or_default();

        // Payload with an id updates that record in place
        if let Some(id) = fields.get("id").and_then(|v| v.as_i64()) {
            let existing = records
                .iter_mut()
                .find(|r| record_id(r) == Some(id))
                .ok_or_else(|| ResolveError::RemoteRejected {
                    kind,
                    reason: format!("{} {} does not exist", kind, id),
                })?;
            if let Some(target) = existing.as_object_mut() {
                for (field, value) in fields {
                    target.insert(field, value);
                }
            }
            return Ok(id);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64;
        let mut record = fields;
        record.insert("id".to_string(), serde_json::Value::from(id));
        records.push(serde_json::Value::Object(record));
        Ok(id)
    }
}
