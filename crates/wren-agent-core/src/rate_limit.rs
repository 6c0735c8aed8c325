//! Token-bucket rate limiting gate for inbound turns.
//!
//! The bucket starts full, refills continuously over the configured period,
//! and computes refill lazily on each consume from elapsed monotonic time.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outcome of one rate-limit check.
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u64,
    pub retry_after: Option<Duration>,
    pub reason: Option<String>,
}

impl RateLimitResult {
    pub fn allowed(remaining: u64) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_after: None,
            reason: None,
        }
    }

    pub fn denied(retry_after: Duration, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after: Some(retry_after),
            reason: Some(reason.into()),
        }
    }
}

/// Trait contract for `RateLimiter` behavior.
///
/// A simple boolean gate, not a queue: the orchestrator never retries a
/// denied turn.
pub trait RateLimiter: Send + Sync {
    fn try_consume(&self) -> RateLimitResult;
}

struct BucketState {
    tokens: u64,
    last_refill: Instant,
}

/// Thread-safe token bucket with lazy refill.
pub struct TokenBucket {
    capacity: u64,
    refill_period: Duration,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(capacity: u64, refill_period: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            refill_period: if refill_period.is_zero() {
                Duration::from_secs(1)
            } else {
                refill_period
            },
            state: Mutex::new(BucketState {
                tokens: capacity.max(1),
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn try_consume(&self) -> RateLimitResult {
        self.try_consume_many(1)
    }

    pub fn try_consume_many(&self, tokens: u64) -> RateLimitResult {
        let Ok(mut state) = self.state.lock() else {
            // A poisoned bucket fails open rather than blocking every turn.
            return RateLimitResult::allowed(0);
        };
        self.refill(&mut state);

        if state.tokens >= tokens {
            state.tokens -= tokens;
            return RateLimitResult::allowed(state.tokens);
        }

        RateLimitResult::denied(self.wait_for_next_token(), "rate limit exceeded")
    }

    fn refill(&self, state: &mut BucketState) {
        let elapsed = state.last_refill.elapsed();
        if elapsed.is_zero() {
            return;
        }

        let tokens_to_add =
            (elapsed.as_nanos() * u128::from(self.capacity)) / self.refill_period.as_nanos();
        if tokens_to_add > 0 {
            let tokens_to_add = u64::try_from(tokens_to_add).unwrap_or(u64::MAX);
            state.tokens = state.tokens.saturating_add(tokens_to_add).min(self.capacity);
            state.last_refill = Instant::now();
        }
    }

    fn wait_for_next_token(&self) -> Duration {
        Duration::from_nanos(
            u64::try_from(self.refill_period.as_nanos() / u128::from(self.capacity))
                .unwrap_or(u64::MAX),
        )
    }
}

/// Token-bucket gate over the whole inbound stream. Admits everything when
/// disabled by configuration.
pub struct TokenBucketRateLimiter {
    enabled: bool,
    bucket: TokenBucket,
}

impl TokenBucketRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            bucket: TokenBucket::new(config.requests_per_minute, Duration::from_secs(60)),
        }
    }
}

impl RateLimiter for TokenBucketRateLimiter {
    fn try_consume(&self) -> RateLimitResult {
        if !self.enabled {
            return RateLimitResult::allowed(u64::MAX);
        }

        let result = self.bucket.try_consume();
        if !result.allowed {
            debug!("rate limit exceeded (global)");
        }
        result
    }
}
