use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info};

use crate::{QuotaPolicy, RouteClass};

/// Verdict for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { limit: u32, remaining: u32 },
    Denied { limit: u32, retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: Instant,
    count: u32,
}

type BucketKey = (String, RouteClass);

/// Fixed-window request counter per (client, route).
///
/// A window opens on a client's first request and resets once its full
/// duration has elapsed; a request landing exactly on the boundary counts
/// against the fresh window. Buckets are only ever evicted after their
/// window expired, so eviction can't hand a client a premature reset.
#[derive(Debug)]
pub struct AdmissionController {
    policy: QuotaPolicy,
    buckets: DashMap<BucketKey, Window>,
    max_tracked: usize,
}

impl AdmissionController {
    pub fn new(policy: QuotaPolicy, max_tracked: usize) -> Self {
        Self {
            policy,
            buckets: DashMap::new(),
            max_tracked: max_tracked.max(1),
        }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    pub fn admit(&self, client: &str, route: RouteClass) -> Admission {
        self.admit_at(client, route, Instant::now())
    }

    /// [`admit`](Self::admit) with an explicit clock reading.
    pub fn admit_at(&self, client: &str, route: RouteClass, now: Instant) -> Admission {
        let quota = self.policy.quota_for(route);

        if self.buckets.len() >= self.max_tracked {
            self.sweep_expired(now);
        }

        // The entry guard holds the shard lock, so check-and-increment is atomic.
        let mut window = self
            .buckets
            .entry((client.to_string(), route))
            .or_insert(Window {
                start: now,
                count: 0,
            });

        let elapsed = now.saturating_duration_since(window.start);
        if elapsed >= quota.window {
            window.start = now;
            window.count = 0;
        }

        if window.count >= quota.limit {
            let retry_after = quota
                .window
                .saturating_sub(now.saturating_duration_since(window.start));
            debug!(client, route = route.as_str(), limit = quota.limit, "request denied");
            return Admission::Denied {
                limit: quota.limit,
                retry_after,
            };
        }

        window.count += 1;
        Admission::Allowed {
            limit: quota.limit,
            remaining: quota.limit - window.count,
        }
    }

    /// Drop buckets whose window has fully elapsed. Returns how many went.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|(_, route), window| {
            now.saturating_duration_since(window.start) < self.policy.quota_for(*route).window
        });
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            info!(removed, tracked = self.buckets.len(), "evicted expired admission windows");
        }
        removed
    }

    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(QuotaPolicy::default(), 10_000)
    }
}
