//! Per-key token bucket admission control.
//!
//! Each key (e.g. `login:203.0.113.7`) owns one bucket, created lazily on
//! first use and kept for the life of the process unless an idle sweep is
//! configured. Buckets refill *intervally*: every full `refill_period` since
//! the last refill grants `refill_tokens`, capped at `capacity`.
//!
//! The map only guards bucket creation. Refill-then-consume happens under the
//! bucket's own mutex, so callers on different keys never wait on each other.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::error::ServiceError;
use crate::http::request::client_address;
use crate::observability::metrics;

/// Capacity and refill schedule shared by every bucket of a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub capacity: u64,
    pub refill_tokens: u64,
    pub refill_period: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::from(&RateLimitConfig::default())
    }
}

impl From<&RateLimitConfig> for RateLimitPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            capacity: config.capacity,
            refill_tokens: config.refill_tokens,
            refill_period: Duration::from_secs(config.refill_period_secs),
        }
    }
}

/// Token counter for one key.
#[derive(Debug)]
pub struct Bucket {
    capacity: u64,
    tokens: u64,
    last_refill: Instant,
    last_seen: Instant,
}

impl Bucket {
    fn new(capacity: u64, now: Instant) -> Self {
        Self {
            capacity,
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn tokens_available(&self) -> u64 {
        self.tokens
    }

    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }

    /// Grant whole intervals elapsed since `last_refill`.
    ///
    /// Partial progress toward the next interval is kept by advancing
    /// `last_refill` by exactly the intervals granted. A `now` earlier than
    /// `last_refill` grants nothing.
    fn refill(&mut self, now: Instant, policy: &RateLimitPolicy) {
        let Some(elapsed) = now.checked_duration_since(self.last_refill) else {
            return;
        };

        let period = policy.refill_period.as_nanos().max(1);
        let intervals = elapsed.as_nanos() / period;
        if intervals == 0 {
            return;
        }

        let granted = intervals.saturating_mul(u128::from(policy.refill_tokens));
        let room = u128::from(self.capacity - self.tokens);
        // granted.min(room) <= capacity - tokens, so the cast is lossless.
        self.tokens += granted.min(room) as u64;

        let advance = u64::try_from(intervals.saturating_mul(period)).unwrap_or(u64::MAX);
        self.last_refill = self
            .last_refill
            .checked_add(Duration::from_nanos(advance))
            .unwrap_or(now);
    }

    fn try_take(&mut self) -> bool {
        if self.tokens >= 1 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }
}

/// Point-in-time copy of a bucket's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSnapshot {
    pub capacity: u64,
    pub tokens_available: u64,
}

/// Process-wide rate limiter keyed by string.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, Arc<Mutex<Bucket>>>,
    policy: RateLimitPolicy,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            buckets: DashMap::new(),
            policy,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(RateLimitPolicy::from(config))
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Existing bucket for `key`, or a full one inserted atomically.
    ///
    /// Concurrent first callers for the same key all receive the same bucket.
    pub fn resolve_bucket(&self, key: &str) -> Arc<Mutex<Bucket>> {
        self.resolve_bucket_at(key, Instant::now())
    }

    fn resolve_bucket_at(&self, key: &str, now: Instant) -> Arc<Mutex<Bucket>> {
        if let Some(existing) = self.buckets.get(key) {
            return Arc::clone(existing.value());
        }

        let entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Bucket::new(self.policy.capacity, now))));
        let bucket = Arc::clone(entry.value());
        drop(entry);

        metrics::record_bucket_count(self.buckets.len());
        bucket
    }

    /// Refill, then take one token if available.
    pub fn try_consume(&self, key: &str) -> bool {
        self.try_consume_at(key, Instant::now())
    }

    /// [`try_consume`](Self::try_consume) with an explicit clock reading.
    pub fn try_consume_at(&self, key: &str, now: Instant) -> bool {
        let bucket = self.resolve_bucket_at(key, now);
        // A poisoned lock still holds consistent counters: every mutation
        // below completes without panicking.
        let mut bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);

        bucket.refill(now, &self.policy);
        bucket.last_seen = now;
        let consumed = bucket.try_take();

        if !consumed {
            tracing::warn!(key = %key, "Rate limit exceeded");
        }
        consumed
    }

    pub fn snapshot(&self, key: &str) -> Option<BucketSnapshot> {
        let bucket = Arc::clone(self.buckets.get(key)?.value());
        let bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        Some(BucketSnapshot {
            capacity: bucket.capacity,
            tokens_available: bucket.tokens,
        })
    }

    /// Drop buckets not touched for at least `idle`. Returns how many were removed.
    ///
    /// Only buckets that are full as of `now` go: a recreated bucket starts
    /// full, so dropping one that is still refilling would hand out tokens.
    /// Buckets whose lock is currently held are always kept.
    pub fn sweep_idle(&self, now: Instant, idle: Duration) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| match bucket.try_lock() {
            Ok(mut bucket) => {
                bucket.refill(now, &self.policy);
                bucket.tokens < bucket.capacity
                    || now.saturating_duration_since(bucket.last_seen) < idle
            }
            Err(_) => true,
        });
        let removed = before.saturating_sub(self.buckets.len());

        if removed > 0 {
            tracing::debug!(removed, remaining = self.buckets.len(), "Swept idle rate limit buckets");
            metrics::record_bucket_count(self.buckets.len());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Key under which login attempts from one client are counted.
pub fn login_key(client: &str) -> String {
    format!("login:{}", client)
}

/// Middleware guarding the login route. Runs before credentials are read.
pub async fn login_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_address(request.headers(), request.extensions());

    if limiter.try_consume(&login_key(&client)) {
        next.run(request).await
    } else {
        tracing::warn!(client = %client, "Too many login attempts");
        metrics::record_rate_limited("login");
        ServiceError::RateLimited.into_response()
    }
}
