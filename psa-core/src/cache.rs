//! Shared cache plumbing
//!
//! `CacheEntry` is the TTL-stamped slot both caches store; `CacheScope` is what
//! the administrative clear operation accepts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::error::ResolveError;

/// A cached value with its fetch time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,

    /// When it was fetched
    pub fetched_at: DateTime<Utc>,

    /// How long it stays fresh
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Create an entry fetched at `fetched_at`
    pub fn new(value: V, fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value,
            fetched_at,
            ttl,
        }
    }

    /// `now - fetched_at > ttl`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at > self.ttl
    }

    /// Age of the entry at `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }
}

/// TTL from configured seconds, clamped to what `chrono::Duration` can hold
pub fn ttl_from_secs(secs: u64) -> Duration {
    let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
    Duration::seconds(secs)
}

mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        i64::deserialize(d).map(Duration::seconds)
    }
}

/// What an administrative clear affects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    /// Every cache
    All,
    /// All name entries
    Names,
    /// Name entries of one kind
    NamesOf(EntityKind),
    /// The metadata snapshot
    Metadata,
}

impl fmt::Display for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheScope::All => f.write_str("all"),
            CacheScope::Names => f.write_str("names"),
            CacheScope::NamesOf(kind) => write!(f, "names:{}", kind.plural_slug()),
            CacheScope::Metadata => f.write_str("metadata"),
        }
    }
}

impl FromStr for CacheScope {
    type Err = ResolveError;

    /// Parses `all`, `names`, `metadata`, or `names:<kind>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let scope = s.trim().to_ascii_lowercase();
        match scope.as_str() {
            "all" => Ok(CacheScope::All),
            "names" => Ok(CacheScope::Names),
            "metadata" => Ok(CacheScope::Metadata),
            other => match other.strip_prefix("names:") {
                Some(kind) => Ok(CacheScope::NamesOf(kind.parse()?)),
                None => Err(ResolveError::Config {
                    reason: format!(
                        "unknown cache scope '{}'; use all, names, names:<kind> or metadata",
                        s
                    ),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_expiry_is_strictly_after_ttl() {
        let fetched = Utc::now();
        let entry = CacheEntry::new("Acme", fetched, Duration::minutes(30));

        assert!(!entry.is_expired(fetched));
        assert!(!entry.is_expired(fetched + Duration::minutes(30)));
        assert!(entry.is_expired(fetched + Duration::minutes(30) + Duration::seconds(1)));
        assert_eq!(entry.age(fetched + Duration::minutes(5)), Duration::minutes(5));
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("all".parse::<CacheScope>().unwrap(), CacheScope::All);
        assert_eq!("Metadata".parse::<CacheScope>().unwrap(), CacheScope::Metadata);
        assert_eq!(
            "names:companies".parse::<CacheScope>().unwrap(),
            CacheScope::NamesOf(EntityKind::Company)
        );
        assert!("everything".parse::<CacheScope>().is_err());
        assert_eq!(CacheScope::NamesOf(EntityKind::Resource).to_string(), "names:resources");
    }
}
