//! # pace-limit
//!
//! `pace-limit` provides lock-free leaky bucket and token bucket rate limiters.
//!
//! ## Core Philosophy
//!
//! Both limiters keep their state in an immutable snapshot
//! `{last refill time, available units}` behind a single atomic pointer.
//! Every `take`/`allow` loads the snapshot, refills it from the elapsed time,
//! consumes a unit and installs the result with one Compare-And-Swap (CAS).
//! There is no `Mutex` anywhere, so callers never wait on each other; they
//! only retry when they lose a race.
//!
//! ## Key Concepts
//!
//! * **Lock-Free**: No `Mutex` or `RwLock` in the hot path.
//! * **Lazy Evaluation**: Units are recalculated at the moment of the request,
//!   eliminating the need for background refill timers.
//! * **Dynamic Rate**: An optional [`DynamicLimit`] retunes the per-unit
//!   interval from an external signal (e.g. CPU load) while requests are in
//!   flight.
//! * **No Fairness**: Grants go to whoever wins the CAS, not to whoever
//!   arrived first. Units are never granted twice.
//!
//! ## Example
//!
//! ```rust
//! use pace_limit::RateLimit;
//! use pace_limit::TokenBucket;
//!
//! // 100 per second, bursts of up to 100
//! let bucket = TokenBucket::new(100, 100)?;
//!
//! if bucket.allow() {
//!     // Request allowed
//! }
//! # Ok::<(), pace_limit::ConfigError>(())
//! ```

use std::fmt::Debug;

mod bucket;
mod dynamic;
mod error;
mod leaky_bucket;
mod options;
mod rate;
mod state;
mod token_bucket;

pub use dynamic::DynamicLimit;
pub use error::ConfigError;
pub use leaky_bucket::LeakyBucket;
pub use options::Options;
pub use quanta::Clock;
pub use quanta::Instant;
pub use quanta::Mock;
pub(crate) use state::State;
pub use token_bucket::TokenBucket;

/// The interface shared by all limiters.
///
/// Limiters are `Send` and `Sync` so they can be shared across threads via
/// `Arc`.
pub trait RateLimit: Debug + Send + Sync {
    /// Blocks the calling thread until a unit is granted.
    ///
    /// Sleeps for one per-unit interval after each failed attempt. Returns
    /// the refill time recorded in the snapshot that granted the unit, so
    /// consecutive return values reflect the pacing rather than when the
    /// caller woke up.
    fn take(&self) -> Instant;

    /// Attempts to grant a unit without blocking.
    ///
    /// Makes exactly one attempt. Losing the CAS to a concurrent caller
    /// counts as a denial even if a unit was available; callers who want to
    /// retry should use [`RateLimit::take`].
    fn allow(&self) -> bool;
}
