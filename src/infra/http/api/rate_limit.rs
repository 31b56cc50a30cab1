use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Admission checks between two sweeps of idle buckets.
const SWEEP_EVERY: u64 = 1024;

/// Sliding-window request limiter keyed by client and route.
#[derive(Debug, Clone)]
pub struct ApiRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
    checks: Arc<AtomicU64>,
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub remaining: u32,
}

impl ApiRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
            checks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn allow(&self, key: &str, route: &str) -> Admission {
        self.allow_at(key, route, Instant::now())
    }

    fn allow_at(&self, key: &str, route: &str, now: Instant) -> Admission {
        let admission = self.admit(format!("{key}:{route}"), now);
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep(now);
        }
        admission
    }

    fn admit(&self, bucket_key: String, now: Instant) -> Admission {
        let window = self.window;

        let mut entry = self.buckets.entry(bucket_key).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        let remaining = self.max_requests.saturating_sub(entry.len() as u32);
        if remaining == 0 {
            return Admission {
                allowed: false,
                remaining: 0,
            };
        }

        entry.push(now);
        Admission {
            allowed: true,
            remaining: remaining - 1,
        }
    }

    /// Drop buckets with no request left inside the window.
    fn sweep(&self, now: Instant) {
        let window = self.window;
        self.buckets.retain(|_, hits| {
            hits.retain(|instant| now.duration_since(*instant) < window);
            !hits.is_empty()
        });
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }
}
