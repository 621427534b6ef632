//! Request admission control: keys, per-key token buckets, and the
//! decision path consulted ahead of every route.

mod bucket;
mod clock;
mod controller;
mod key;
mod store;

pub use bucket::BucketState;
pub use clock::{Clock, MonotonicClock};
pub use controller::{AdmissionController, Decision};
pub use key::{AdmissionKey, KeyExtractor, KeyStrategy};
pub use store::WindowStore;
