use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::lock_utils::lock_recover;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_requests: usize,
}

impl RateLimitPolicy {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
        }
    }

    fn window_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    /// Seconds until the oldest admission in the window expires, in `[1, window]`.
    fn retry_after_secs(&self, oldest: Instant, now: Instant) -> u64 {
        let remaining = self.window.saturating_sub(now.saturating_duration_since(oldest));
        let secs = remaining.as_millis().div_ceil(1000) as u64;
        secs.clamp(1, self.window_secs())
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(60_000), 10)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: usize },
    Limited { retry_after_secs: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Backing storage for per-client admission timestamps.
pub trait RateLimitStore: Send + Sync {
    /// Prunes the client's expired entries, then admits and records `now`
    /// when fewer than `policy.max_requests` remain. Must be atomic per client.
    fn check_and_record(&self, client: &str, now: Instant, policy: &RateLimitPolicy)
        -> RateDecision;

    /// Drops every client without live timestamps.
    fn evict_expired(&self, now: Instant, window: Duration);

    fn tracked_clients(&self) -> usize;
}

#[derive(Default)]
struct ClientTable {
    clients: HashMap<String, VecDeque<Instant>>,
    last_sweep_at: Option<Instant>,
}

fn prune(entries: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while entries
        .front()
        .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= window)
    {
        entries.pop_front();
    }
}

/// Process-local store; sweeps idle clients at most once per window.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    table: Mutex<ClientTable>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sweep_locked(table: &mut ClientTable, now: Instant, window: Duration) {
        table.clients.retain(|_, entries| {
            prune(entries, now, window);
            !entries.is_empty()
        });
        table.last_sweep_at = Some(now);
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn check_and_record(
        &self,
        client: &str,
        now: Instant,
        policy: &RateLimitPolicy,
    ) -> RateDecision {
        let mut table = lock_recover(&self.table, "rate_limit_clients");
        let sweep_due = table
            .last_sweep_at
            .map_or(true, |last| now.saturating_duration_since(last) >= policy.window);
        if sweep_due {
            Self::sweep_locked(&mut table, now, policy.window);
        }

        let entries = table.clients.entry(client.to_string()).or_default();
        prune(entries, now, policy.window);
        if entries.len() < policy.max_requests {
            entries.push_back(now);
            return RateDecision::Allowed {
                remaining: policy.max_requests - entries.len(),
            };
        }
        let retry_after_secs = entries
            .front()
            .map(|oldest| policy.retry_after_secs(*oldest, now))
            .unwrap_or_else(|| policy.window_secs());
        if entries.is_empty() {
            table.clients.remove(client);
        }
        RateDecision::Limited { retry_after_secs }
    }

    fn evict_expired(&self, now: Instant, window: Duration) {
        let mut table = lock_recover(&self.table, "rate_limit_clients");
        Self::sweep_locked(&mut table, now, window);
    }

    fn tracked_clients(&self) -> usize {
        lock_recover(&self.table, "rate_limit_clients").clients.len()
    }
}

/// Fixed-window per-client request throttle.
#[derive(Clone)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_store(policy, Arc::new(InMemoryRateLimitStore::new()))
    }

    pub fn with_store(policy: RateLimitPolicy, store: Arc<dyn RateLimitStore>) -> Self {
        Self { policy, store }
    }

    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        let decision = self.store.check_and_record(client, now, &self.policy);
        if let RateDecision::Limited { retry_after_secs } = decision {
            log::warn!(
                "event=rate_limited client={} retry_after_secs={}",
                client,
                retry_after_secs
            );
        }
        decision
    }

    pub fn allow(&self, client: &str) -> bool {
        self.check(client).is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitPolicy::default())
    }

    #[test]
    fn admits_max_requests_then_rejects() {
        let limiter = limiter();
        let start = Instant::now();
        for i in 0..10 {
            let decision = limiter.check_at("10.0.0.1", start + Duration::from_millis(i * 100));
            assert_eq!(
                decision,
                RateDecision::Allowed {
                    remaining: 9 - i as usize
                }
            );
        }
        let decision = limiter.check_at("10.0.0.1", start + Duration::from_secs(1));
        assert_eq!(
            decision,
            RateDecision::Limited {
                retry_after_secs: 59
            }
        );
    }

    #[test]
    fn rejected_requests_are_not_recorded() {
        let limiter = RateLimiter::new(RateLimitPolicy::new(Duration::from_secs(60), 1));
        let start = Instant::now();
        assert!(limiter.check_at("c", start).is_allowed());
        assert!(!limiter.check_at("c", start + Duration::from_secs(30)).is_allowed());
        assert!(limiter.check_at("c", start + Duration::from_secs(60)).is_allowed());
    }

    #[test]
    fn retry_after_is_clamped_to_window() {
        let policy = RateLimitPolicy::default();
        let now = Instant::now();
        assert_eq!(policy.retry_after_secs(now, now), 60);
        assert_eq!(
            policy.retry_after_secs(now, now + Duration::from_millis(59_999)),
            1
        );
        assert_eq!(
            policy.retry_after_secs(now, now + Duration::from_millis(58_500)),
            2
        );
    }

    #[test]
    fn clients_are_isolated() {
        let limiter = RateLimiter::new(RateLimitPolicy::new(Duration::from_secs(60), 1));
        assert!(limiter.allow("a"));
        assert!(limiter.allow("b"));
        assert!(!limiter.allow("a"));
    }

    #[test]
    fn sweep_drops_idle_clients() {
        let store = Arc::new(InMemoryRateLimitStore::new());
        let limiter = RateLimiter::with_store(RateLimitPolicy::default(), store.clone());
        let start = Instant::now();
        limiter.check_at("a", start);
        limiter.check_at("b", start);
        assert_eq!(store.tracked_clients(), 2);

        limiter.check_at("c", start + Duration::from_secs(61));
        assert_eq!(store.tracked_clients(), 1);

        store.evict_expired(start + Duration::from_secs(200), Duration::from_secs(60));
        assert_eq!(store.tracked_clients(), 0);
    }

    #[test]
    fn concurrent_requests_from_one_client_never_exceed_limit() {
        let limiter = limiter();
        let admitted = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..32)
                .map(|_| scope.spawn(|| limiter.allow("racer")))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(false))
                .filter(|allowed| *allowed)
                .count()
        });
        assert_eq!(admitted, 10);
    }
}
