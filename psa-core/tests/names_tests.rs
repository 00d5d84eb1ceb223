//! NameResolutionCache tests

use std::sync::Arc;

use chrono::Duration;
use psa_core::{
    DirectUpstream, EntityKind, ManualClock, NameCacheConfig, NameResolutionCache, TICKET_NAME_REFERENCES,
};
use serde_json::json;

fn upstream_with_people() -> Arc<DirectUpstream> {
    let upstream = DirectUpstream::new();
    upstream.insert_records(
        EntityKind::Company,
        vec![
            json!({ "id": 1, "companyName": "Acme Corp" }),
            json!({ "id": 2, "companyName": "Globex" }),
        ],
    );
    upstream.insert_records(
        EntityKind::Resource,
        vec![
            json!({ "id": 10, "firstName": "Dana", "lastName": "Reyes" }),
            json!({ "id": 11, "firstName": "Sam", "lastName": "Ortiz" }),
        ],
    );
    Arc::new(upstream)
}

fn cache(upstream: &Arc<DirectUpstream>, clock: &Arc<ManualClock>) -> NameResolutionCache {
    NameResolutionCache::new(upstream.clone(), clock.clone(), &NameCacheConfig::default())
}

#[tokio::test]
async fn test_resolve_many_marks_missing_ids() {
    let upstream = upstream_with_people();
    let clock = Arc::new(ManualClock::starting_now());
    let names = cache(&upstream, &clock);

    let resolved = names.resolve_many(EntityKind::Company, [1, 2, 3]).await;

    assert_eq!(resolved.len(), 3);
    assert_eq!(resolved[&1].display_name, "Acme Corp");
    assert!(resolved[&1].found);
    assert_eq!(resolved[&2].display_name, "Globex");
    assert!(resolved[&2].found);
    assert_eq!(resolved[&3].display_name, "Unknown Company (3)");
    assert!(!resolved[&3].found);
}

#[tokio::test]
async fn test_repeat_lookup_within_ttl_uses_cache() {
    let upstream = upstream_with_people();
    let clock = Arc::new(ManualClock::starting_now());
    let names = cache(&upstream, &clock);

    names.resolve_many(EntityKind::Company, [1, 2]).await;
    clock.advance(Duration::minutes(29));
    let second = names.resolve_many(EntityKind::Company, [2, 1]).await;

    assert_eq!(upstream.call_counts().fetch_by_ids, 1);
    assert_eq!(second[&1].display_name, "Acme Corp");

    let stats = names.stats().await;
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.upstream_fetches, 1);
}

#[tokio::test]
async fn test_not_found_is_stable_within_ttl() {
    let upstream = upstream_with_people();
    let clock = Arc::new(ManualClock::starting_now());
    let names = cache(&upstream, &clock);

    for _ in 0..3 {
        let value = names.resolve_one(EntityKind::Company, 99).await;
        assert!(!value.found);
        assert_eq!(value.display_name, "Unknown Company (99)");
    }

    assert_eq!(upstream.call_counts().fetch_by_ids, 1);
}

#[tokio::test]
async fn test_expired_entries_are_refetched() {
    let upstream = upstream_with_people();
    let clock = Arc::new(ManualClock::starting_now());
    let names = cache(&upstream, &clock);

    names.resolve_one(EntityKind::Company, 1).await;
    clock.advance(Duration::minutes(30) + Duration::seconds(1));
    names.resolve_one(EntityKind::Company, 1).await;

    assert_eq!(upstream.call_counts().fetch_by_ids, 2);
}

#[tokio::test]
async fn test_duplicate_ids_collapse_to_one_lookup() {
    let upstream = upstream_with_people();
    let clock = Arc::new(ManualClock::starting_now());
    let names = cache(&upstream, &clock);

    let resolved = names.resolve_many(EntityKind::Resource, vec![10, 10, 11, 10]).await;

    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[&10].display_name, "Dana Reyes");
    assert_eq!(upstream.call_counts().fetch_by_ids, 1);
    assert_eq!(names.stats().await.misses, 2);
}

#[tokio::test]
async fn test_only_missing_ids_go_upstream() {
    let upstream = upstream_with_people();
    let clock = Arc::new(ManualClock::starting_now());
    let names = cache(&upstream, &clock);

    names.resolve_one(EntityKind::Company, 1).await;
    let resolved = names.resolve_many(EntityKind::Company, [1, 2]).await;

    assert!(resolved[&2].found);
    assert_eq!(upstream.call_counts().fetch_by_ids, 2);

    let stats = names.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.per_kind[&EntityKind::Company].count, 2);
}

#[tokio::test]
async fn test_upstream_failure_yields_uncached_placeholders() {
    let upstream = upstream_with_people();
    let clock = Arc::new(ManualClock::starting_now());
    let names = cache(&upstream, &clock);

    upstream.set_available(false);
    let degraded = names.resolve_many(EntityKind::Company, [1, 2]).await;

    assert_eq!(degraded[&1].display_name, "Unknown Company (1)");
    assert!(!degraded[&1].found);
    assert_eq!(names.stats().await.fallbacks, 2);
    assert!(names.stats().await.per_kind.is_empty());

    upstream.set_available(true);
    let recovered = names.resolve_many(EntityKind::Company, [1, 2]).await;

    assert!(recovered[&1].found);
    assert_eq!(recovered[&1].display_name, "Acme Corp");
    assert_eq!(upstream.call_counts().fetch_by_ids, 2);
}

#[tokio::test]
async fn test_disabled_cache_always_fetches() {
    let upstream = upstream_with_people();
    let clock = Arc::new(ManualClock::starting_now());
    let config = NameCacheConfig {
        enabled: false,
        ..NameCacheConfig::default()
    };
    let names = NameResolutionCache::new(upstream.clone(), clock, &config);

    names.resolve_one(EntityKind::Company, 1).await;
    names.resolve_one(EntityKind::Company, 1).await;

    assert_eq!(upstream.call_counts().fetch_by_ids, 2);
    assert!(names.stats().await.per_kind.is_empty());
}

#[tokio::test]
async fn test_invalidate_by_kind() {
    let upstream = upstream_with_people();
    let clock = Arc::new(ManualClock::starting_now());
    let names = cache(&upstream, &clock);

    names.resolve_many(EntityKind::Company, [1, 2]).await;
    names.resolve_many(EntityKind::Resource, [10]).await;

    assert_eq!(names.invalidate(Some(EntityKind::Company)).await, 2);

    let stats = names.stats().await;
    assert!(!stats.per_kind.contains_key(&EntityKind::Company));
    assert_eq!(stats.per_kind[&EntityKind::Resource].count, 1);

    names.clear().await;
    assert!(names.stats().await.per_kind.is_empty());
}

#[tokio::test]
async fn test_stats_report_oldest_entry_age() {
    let upstream = upstream_with_people();
    let clock = Arc::new(ManualClock::starting_now());
    let names = cache(&upstream, &clock);

    names.resolve_one(EntityKind::Company, 1).await;
    clock.advance(Duration::minutes(5));
    names.resolve_one(EntityKind::Company, 2).await;
    clock.advance(Duration::minutes(1));

    let stats = names.stats().await;
    assert_eq!(stats.per_kind[&EntityKind::Company].oldest_entry_age_secs, Some(360));
    assert_eq!(stats.ttl_seconds, 1800);
}

#[tokio::test]
async fn test_enhance_labels_ticket_references() {
    let upstream = upstream_with_people();
    let clock = Arc::new(ManualClock::starting_now());
    let names = cache(&upstream, &clock);

    let mut tickets = vec![
        json!({ "id": 100, "companyID": 1, "assignedResourceID": 10 }),
        json!({ "id": 101, "companyID": 1, "assignedResourceID": null }),
        json!({ "id": 102, "companyID": 7 }),
    ];

    names.enhance(&mut tickets, &TICKET_NAME_REFERENCES).await;

    assert_eq!(tickets[0]["_enhanced"]["companyName"], "Acme Corp");
    assert_eq!(tickets[0]["_enhanced"]["assignedResourceName"], "Dana Reyes");
    assert_eq!(tickets[1]["_enhanced"]["companyName"], "Acme Corp");
    assert!(tickets[1]["_enhanced"].get("assignedResourceName").is_none());
    assert_eq!(tickets[2]["_enhanced"]["companyName"], "Unknown Company (7)");

    // One call per referenced kind
    assert_eq!(upstream.call_counts().fetch_by_ids, 2);
}

#[tokio::test]
async fn test_overlapping_concurrent_lookups_agree() {
    let upstream = upstream_with_people();
    let clock = Arc::new(ManualClock::starting_now());
    let names = Arc::new(cache(&upstream, &clock));

    let mut handles = Vec::new();
    for i in 0..8 {
        let names = names.clone();
        handles.push(tokio::spawn(async move {
            let ids = if i % 2 == 0 { vec![1, 2] } else { vec![2, 3] };
            names.resolve_many(EntityKind::Company, ids).await
        }));
    }

    for handle in handles {
        let resolved = handle.await.unwrap();
        assert_eq!(resolved[&2].display_name, "Globex");
        if let Some(missing) = resolved.get(&3) {
            assert!(!missing.found);
        }
    }

    let stats = names.stats().await;
    assert_eq!(stats.per_kind[&EntityKind::Company].count, 3);
}

#[tokio::test]
async fn test_capacity_evicts_oldest_entries() {
    let upstream = upstream_with_people();
    let clock = Arc::new(ManualClock::starting_now());
    let config = NameCacheConfig {
        max_entries: 3,
        ..NameCacheConfig::default()
    };
    let names = NameResolutionCache::new(upstream.clone(), clock.clone(), &config);

    names.resolve_many(EntityKind::Company, [1, 2]).await;
    clock.advance(Duration::minutes(1));
    names.resolve_one(EntityKind::Company, 3).await;
    clock.advance(Duration::minutes(1));
    names.resolve_many(EntityKind::Company, [4, 5]).await;

    let stats = names.stats().await;
    assert_eq!(stats.per_kind[&EntityKind::Company].count, 3);
    assert_eq!(stats.evictions, 2);
    assert_eq!(upstream.call_counts().fetch_by_ids, 3);

    // 3 survived, 1 was evicted and costs another lookup
    names.resolve_one(EntityKind::Company, 3).await;
    assert_eq!(upstream.call_counts().fetch_by_ids, 3);
    assert_eq!(names.resolve_one(EntityKind::Company, 1).await.display_name, "Acme Corp");
    assert_eq!(upstream.call_counts().fetch_by_ids, 4);
    assert_eq!(names.stats().await.per_kind[&EntityKind::Company].count, 3);
}

#[tokio::test]
async fn test_expired_entries_are_dropped_before_live_ones() {
    let upstream = upstream_with_people();
    let clock = Arc::new(ManualClock::starting_now());
    let config = NameCacheConfig {
        max_entries: 100,
        ..NameCacheConfig::default()
    };
    let names = NameResolutionCache::new(upstream.clone(), clock.clone(), &config);

    for batch in 0..5_i64 {
        let ids: Vec<i64> = (0..60).map(|i| 1_000 + batch * 60 + i).collect();
        names.resolve_many(EntityKind::Company, ids).await;
        clock.advance(Duration::hours(1));
    }

    let stats = names.stats().await;
    assert_eq!(stats.per_kind[&EntityKind::Company].count, 60);
    assert_eq!(stats.evictions, 0);
}
