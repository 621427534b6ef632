//! Per-key token bucket state.

use std::time::{Duration, Instant};

/// Mutable rate-limit state for a single admission key.
///
/// Tokens are real-valued so slow refill rates never starve a caller
/// through integer truncation. Invariant: `0 <= tokens <= capacity`,
/// maintained by [`refill`](Self::refill) and
/// [`try_consume`](Self::try_consume). `last_refill` never decreases.
#[derive(Debug)]
pub struct BucketState {
    /// Currently available tokens
    tokens: f64,
    /// When tokens were last recomputed
    last_refill: Instant,
    /// When this key was last seen, used for idle eviction
    last_seen: Instant,
}

impl BucketState {
    /// A previously-unseen key starts with a full bucket.
    pub fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    /// Lazily refill tokens for the time elapsed since the last check.
    ///
    /// A non-monotonic `now` (which the clock contract rules out) yields a
    /// zero elapsed time rather than draining tokens.
    pub fn refill(&mut self, now: Instant, capacity: f64, refill_rate: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * refill_rate).min(capacity);
        self.last_refill = self.last_refill.max(now);
        self.last_seen = self.last_seen.max(now);
    }

    /// Consume one token if at least one is available.
    ///
    /// A bucket crossing exactly 1.0 admits: the comparison is `>=`.
    pub fn try_consume(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until the bucket refills back to one whole token.
    pub fn time_until_available(&self, refill_rate: f64) -> Duration {
        let deficit = 1.0 - self.tokens;
        if deficit <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(deficit / refill_rate)
        }
    }

    /// Currently available tokens.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// How long this key has gone unseen.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }
}
