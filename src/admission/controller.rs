//! Core admission decision: the token-bucket check-and-consume path.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use super::bucket::BucketState;
use super::clock::Clock;
use super::key::AdmissionKey;
use super::store::WindowStore;
use crate::config::LimiterConfig;

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Forward the request unchanged.
    Allowed,
    /// Reject the request; a token will be available after `retry_after`.
    Denied { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// The global request-admission controller.
///
/// Every inbound request goes through [`check_and_consume`] before route
/// dispatch. The check is purely in-memory arithmetic under one per-key
/// entry guard: O(1), no I/O, no suspension. Token bucket rather than a
/// fixed window so a client cannot burst `capacity` requests at the end of
/// one window and `capacity` more at the start of the next; refill is
/// computed lazily from elapsed time, so no per-key timer exists.
///
/// [`check_and_consume`]: Self::check_and_consume
pub struct AdmissionController {
    /// Immutable limiter parameters, fixed at startup
    config: LimiterConfig,
    /// Per-key bucket state
    store: Arc<WindowStore>,
    /// Monotonic time source
    clock: Arc<dyn Clock>,
}

impl AdmissionController {
    /// Create a new controller over the given store and clock.
    pub fn new(config: LimiterConfig, store: Arc<WindowStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store,
            clock,
        }
    }

    /// Check the rate limit for a key, consuming one token if available.
    pub fn check_and_consume(&self, key: &AdmissionKey) -> Decision {
        let now = self.clock.now();
        let capacity = f64::from(self.config.capacity);
        let rate = self.config.refill_rate_per_sec;

        trace!(key = %key, "Checking admission");

        let decision = self.store.with_bucket(
            key,
            || BucketState::new(capacity, now),
            |bucket| {
                bucket.refill(now, capacity, rate);
                if bucket.try_consume() {
                    Decision::Allowed
                } else {
                    Decision::Denied {
                        retry_after: bucket.time_until_available(rate),
                    }
                }
            },
        );

        if let Decision::Denied { retry_after } = decision {
            debug!(
                key = %key,
                retry_after_secs = retry_after.as_secs_f64(),
                "Admission denied"
            );
        }

        decision
    }

    /// The store backing this controller.
    pub fn store(&self) -> &Arc<WindowStore> {
        &self.store
    }

    /// The limiter configuration this controller enforces.
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }
}
