//! Pagination resolver
//!
//! Turns a caller's size hint into one or more bounded upstream fetches.
//!
//! ## Size semantics
//!
//! | requested | outcome |
//! |-----------|---------|
//! | absent or `0` | the kind's default size |
//! | `1..=max` | exactly that many (or fewer if the upstream runs out) |
//! | `> max` | silently capped to `max`, surfaced via `capped_from` |
//! | `-1` | unlimited: fetch in batches until a short page or the call ceiling |
//! | `< -1` | `InvalidPageSize` |

use std::collections::HashMap;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use crate::entity::EntityKind;
use crate::error::{ResolveError, ResolveResult};

/// Sentinel page size meaning "everything"
pub const UNLIMITED_SENTINEL: i64 = -1;

/// Per-kind size policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePolicy {
    /// Size used when the caller gives none
    pub default_size: usize,
    /// Largest total a bounded request may return
    pub max_size: usize,
    /// Whether `-1` is honoured
    pub unlimited_allowed: bool,
    /// Largest single upstream call
    pub batch_size: usize,
}

impl PagePolicy {
    /// Create a policy
    pub const fn new(default_size: usize, max_size: usize, unlimited_allowed: bool, batch_size: usize) -> Self {
        Self {
            default_size,
            max_size,
            unlimited_allowed,
            batch_size,
        }
    }

    /// Built-in policy for a kind
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Company | EntityKind::Contact | EntityKind::Ticket => {
                PagePolicy::new(50, 500, true, 500)
            }
            EntityKind::Resource => PagePolicy::new(25, 500, true, 500),
            EntityKind::Project | EntityKind::Task => PagePolicy::new(25, 100, false, 100),
            EntityKind::TicketNote | EntityKind::ProjectNote | EntityKind::CompanyNote => {
                PagePolicy::new(25, 100, false, 100)
            }
            EntityKind::TicketAttachment => PagePolicy::new(10, 50, false, 50),
            EntityKind::TimeEntry
            | EntityKind::ExpenseReport
            | EntityKind::Quote
            | EntityKind::Contract
            | EntityKind::Invoice
            | EntityKind::ConfigurationItem => PagePolicy::new(25, 500, false, 500),
        }
    }

    /// Check `default <= max`, `batch <= max` and non-zero sizes
    pub fn check(&self) -> Result<(), String> {
        if self.default_size == 0 || self.max_size == 0 || self.batch_size == 0 {
            return Err("sizes must be greater than zero".to_string());
        }
        if self.default_size > self.max_size {
            return Err(format!(
                "default_size {} exceeds max_size {}",
                self.default_size, self.max_size
            ));
        }
        if self.batch_size > self.max_size {
            return Err(format!(
                "batch_size {} exceeds max_size {}",
                self.batch_size, self.max_size
            ));
        }
        Ok(())
    }
}

/// Caller's size hint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Requested total; `None` or `0` for the default, `-1` for unlimited
    pub requested_size: Option<i64>,
}

impl PageRequest {
    /// Request the kind's default size
    pub fn default_size() -> Self {
        Self { requested_size: None }
    }

    /// Request an explicit size
    pub fn sized(size: i64) -> Self {
        Self {
            requested_size: Some(size),
        }
    }

    /// Request every record
    pub fn unlimited() -> Self {
        Self::sized(UNLIMITED_SENTINEL)
    }
}

/// Resolved fetch plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectivePlan {
    /// Kind being fetched
    pub kind: EntityKind,
    /// Size of each upstream call
    pub per_call_size: usize,
    /// Upper bound on upstream calls
    pub max_calls: usize,
    /// Total item cap; `None` for unlimited plans
    pub total_limit: Option<usize>,
    /// Original request when it exceeded the policy maximum
    pub capped_from: Option<usize>,
}

impl EffectivePlan {
    /// Whether this plan fetches until exhaustion
    pub fn is_unlimited(&self) -> bool {
        self.total_limit.is_none()
    }

    /// A page shorter than this ends the fetch
    pub fn stop_early_if_count(&self) -> usize {
        self.per_call_size
    }
}

/// Aggregated outcome of a plan
#[derive(Debug, Clone, Serialize)]
pub struct PageResult<T> {
    /// Items in upstream order
    pub items: Vec<T>,
    /// More matching records may exist upstream
    pub possibly_truncated: bool,
    /// Upstream calls issued
    pub calls_made: usize,
    /// Original request when it exceeded the policy maximum
    pub capped_from: Option<usize>,
    /// Total the request was capped to
    pub capped_to: Option<usize>,
    /// An unlimited fetch stopped at the call ceiling
    pub hit_call_ceiling: bool,
}

impl<T> PageResult<T> {
    /// Human-readable note about capping or truncation
    pub fn message(&self) -> Option<String> {
        let mut notes = Vec::new();
        if let (Some(requested), Some(cap)) = (self.capped_from, self.capped_to) {
            notes.push(format!(
                "Requested {} results; capped to the maximum of {}.",
                requested, cap
            ));
        }
        if self.hit_call_ceiling {
            notes.push(format!(
                "Stopped after {} upstream calls; results are incomplete. Narrow the filter to see the rest.",
                self.calls_made
            ));
        } else if self.possibly_truncated {
            notes.push(format!(
                "Returned {} results; more may exist. Request a larger page size or narrow the filter.",
                self.items.len()
            ));
        }
        if notes.is_empty() {
            None
        } else {
            Some(notes.join(" "))
        }
    }
}

/// Plans and executes bounded fetches
#[derive(Debug, Clone)]
pub struct PaginationResolver {
    overrides: HashMap<EntityKind, PagePolicy>,
    max_unlimited_calls: usize,
}

impl PaginationResolver {
    /// Create with the built-in policy table
    pub fn new() -> Self {
        Self::with_config(&PaginationConfig::default())
    }

    /// Create with configured overrides
    pub fn with_config(config: &PaginationConfig) -> Self {
        Self {
            overrides: config.overrides.iter().map(|(k, p)| (*k, *p)).collect(),
            max_unlimited_calls: config.max_unlimited_calls.max(1),
        }
    }

    /// Effective policy for a kind
    pub fn policy(&self, kind: EntityKind) -> PagePolicy {
        self.overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| PagePolicy::for_kind(kind))
    }

    /// Resolve a request against the kind's policy
    pub fn resolve(&self, kind: EntityKind, request: PageRequest) -> ResolveResult<EffectivePlan> {
        let policy = self.policy(kind);

        match request.requested_size {
            Some(UNLIMITED_SENTINEL) => {
                if !policy.unlimited_allowed {
                    return Err(ResolveError::UnsupportedUnlimitedPagination { kind });
                }
                Ok(EffectivePlan {
                    kind,
                    per_call_size: policy.batch_size,
                    max_calls: self.max_unlimited_calls,
                    total_limit: None,
                    capped_from: None,
                })
            }
            Some(requested) if requested < 0 => Err(ResolveError::InvalidPageSize { requested }),
            Some(requested) if requested > 0 => {
                let requested = usize::try_from(requested).unwrap_or(usize::MAX);
                Ok(Self::bounded_plan(kind, &policy, requested))
            }
            _ => Ok(Self::bounded_plan(kind, &policy, policy.default_size)),
        }
    }

    fn bounded_plan(kind: EntityKind, policy: &PagePolicy, requested: usize) -> EffectivePlan {
        let capped_from = if requested > policy.max_size {
            tracing::warn!(
                kind = %kind,
                requested,
                max = policy.max_size,
                "Requested page size exceeds maximum; capping"
            );
            Some(requested)
        } else {
            None
        };

        let total = requested.min(policy.max_size);
        let per_call_size = total.min(policy.batch_size).max(1);

        EffectivePlan {
            kind,
            per_call_size,
            max_calls: total.div_ceil(per_call_size),
            total_limit: Some(total),
            capped_from,
        }
    }

    /// Execute a plan against a page fetcher
    ///
    /// `fetch_page(offset, size)` is called sequentially; results are
    /// concatenated in the order returned. A fetch error is propagated,
    /// there is no safe fallback for a primary read.
    pub async fn execute<T, F, Fut>(&self, plan: &EffectivePlan, mut fetch_page: F) -> ResolveResult<PageResult<T>>
    where
        F: FnMut(usize, usize) -> Fut,
        Fut: Future<Output = ResolveResult<Vec<T>>>,
    {
        let mut items: Vec<T> = Vec::new();
        let mut calls_made = 0;
        let mut last_page_full = false;

        while calls_made < plan.max_calls {
            let size = match plan.total_limit {
                Some(limit) => plan.per_call_size.min(limit.saturating_sub(items.len())),
                None => plan.per_call_size,
            };
            if size == 0 {
                break;
            }

            let offset = items.len();
            let mut page = match fetch_page(offset, size).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(
                        kind = %plan.kind,
                        offset,
                        size,
                        calls_made,
                        "Page fetch failed: {}",
                        e
                    );
                    return Err(e);
                }
            };
            calls_made += 1;

            // Never hand back more than was asked for
            page.truncate(size);
            last_page_full = page.len() == size;
            items.extend(page);

            if !last_page_full {
                break;
            }
        }

        let hit_call_ceiling = plan.is_unlimited() && last_page_full && calls_made >= plan.max_calls;
        if hit_call_ceiling {
            tracing::warn!(
                kind = %plan.kind,
                calls_made,
                items = items.len(),
                "Unlimited fetch reached the call ceiling; result is capped"
            );
        }

        let possibly_truncated = if plan.is_unlimited() {
            hit_call_ceiling
        } else {
            last_page_full
        };

        tracing::debug!(
            kind = %plan.kind,
            calls_made,
            items = items.len(),
            possibly_truncated,
            "Pagination complete"
        );

        Ok(PageResult {
            items,
            possibly_truncated,
            calls_made,
            capped_from: plan.capped_from,
            capped_to: plan.capped_from.and(plan.total_limit),
            hit_call_ceiling,
        })
    }

    /// Resolve a size hint and execute the resulting plan
    pub async fn resolve_and_fetch<T, F, Fut>(
        &self,
        kind: EntityKind,
        requested_size: Option<i64>,
        fetch_page: F,
    ) -> ResolveResult<PageResult<T>>
    where
        F: FnMut(usize, usize) -> Fut,
        Fut: Future<Output = ResolveResult<Vec<T>>>,
    {
        let plan = self.resolve(kind, PageRequest { requested_size })?;
        self.execute(&plan, fetch_page).await
    }
}

impl Default for PaginationResolver {
    fn default() -> Self {
        Self::new()
    }
}
