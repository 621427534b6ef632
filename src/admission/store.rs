//! Concurrent per-key bucket storage with idle eviction.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::bucket::BucketState;
use super::clock::Clock;
use super::key::AdmissionKey;

/// Concurrent mapping from admission key to bucket state.
///
/// Backed by a sharded map: checks for distinct keys contend only when the
/// keys hash to the same shard, never on a single store-wide lock. The
/// entry guard gives a check exclusive access to one key's state for the
/// duration of its O(1) arithmetic, which makes per-key checks
/// linearizable with no lost token updates.
///
/// The store exclusively owns all bucket state. Eviction racing a
/// concurrent check for the same key is benign: the check simply recreates
/// the bucket at full capacity, which is the intended treatment of a key
/// with no recent history.
pub struct WindowStore {
    /// Bucket state indexed by admission key
    buckets: DashMap<AdmissionKey, BucketState>,
}

impl WindowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// Run `check` with exclusive access to the key's bucket, creating the
    /// bucket via `create` if the key has not been seen (or was evicted).
    pub fn with_bucket<T>(
        &self,
        key: &AdmissionKey,
        create: impl FnOnce() -> BucketState,
        check: impl FnOnce(&mut BucketState) -> T,
    ) -> T {
        let mut entry = self.buckets.entry(key.clone()).or_insert_with(|| {
            trace!(key = %key, "Creating bucket for previously-unseen key");
            create()
        });
        check(entry.value_mut())
    }

    /// Remove buckets whose keys have gone unseen past the threshold.
    ///
    /// Returns the number of buckets removed. Locks are taken one shard at
    /// a time, so concurrent checks are only ever delayed by the unlinking
    /// of already-expired entries in their own shard.
    pub fn sweep(&self, now: Instant, idle_after: Duration) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, state| state.idle_for(now) <= idle_after);
        before.saturating_sub(self.buckets.len())
    }

    /// Spawn the periodic eviction sweep.
    ///
    /// The sweep is an optimization to bound memory, not a correctness
    /// requirement; lazy refill is self-correcting regardless of sweep
    /// timing. On shutdown the returned handle is simply aborted, there is
    /// no in-flight state to preserve.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        idle_after: Duration,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = store.sweep(clock.now(), idle_after);
                if removed > 0 {
                    debug!(
                        removed = removed,
                        tracked = store.tracked_keys(),
                        "Evicted idle admission keys"
                    );
                }
            }
        })
    }

    /// Get the number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }

    /// Clear all buckets.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.buckets.clear();
    }
}

impl Default for WindowStore {
    fn default() -> Self {
        Self::new()
    }
}
