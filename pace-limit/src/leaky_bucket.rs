use std::time::Duration;

use quanta::Instant;

use crate::ConfigError;
use crate::Options;
use crate::RateLimit;
use crate::bucket::Bucket;

/// A smoothing limiter that paces permits at a fixed rate.
///
/// With the default burst of one, consecutive [`RateLimit::take`] calls
/// return timestamps at least `per / rate` apart. [`LeakyBucket::with_burst`]
/// lets a little slack accumulate while idle.
///
/// This runs the same refill-then-consume state machine as
/// [`TokenBucket`](crate::TokenBucket). The type exists for intent: a leaky
/// bucket is "N per second, evenly spaced", a token bucket is "a pool that
/// can be drained in bursts".
///
/// Grants are not FIFO: when several callers race, whichever wins the CAS
/// gets the slot, regardless of who arrived first.
///
/// ```rust
/// use pace_limit::LeakyBucket;
/// use pace_limit::RateLimit;
///
/// let limiter = LeakyBucket::new(100)?;
///
/// let first = limiter.take();
/// let second = limiter.take();
/// assert!(second.duration_since(first) >= limiter.interval());
/// # Ok::<(), pace_limit::ConfigError>(())
/// ```
#[derive(Debug)]
pub struct LeakyBucket {
    bucket: Bucket,
}

impl LeakyBucket {
    /// Creates a `LeakyBucket` releasing `rate` permits per second.
    pub fn new(rate: u64) -> Result<Self, ConfigError> {
        Self::with_options(rate, Options::default())
    }

    /// Creates a `LeakyBucket` releasing `rate` permits per `options.per`.
    pub fn with_options(rate: u64, options: Options) -> Result<Self, ConfigError> {
        Self::with_burst(rate, 1, options)
    }

    /// Creates a `LeakyBucket` that can bank up to `burst` slots while idle.
    pub fn with_burst(rate: u64, burst: u64, options: Options) -> Result<Self, ConfigError> {
        Ok(Self {
            bucket: Bucket::new(rate, burst, options)?,
        })
    }

    /// Waits for a slot without blocking the executor thread.
    pub async fn take_async(&self) -> Instant {
        self.bucket.take_async().await
    }

    /// Slots recorded in the current snapshot, before any pending refill.
    pub fn available(&self) -> u64 {
        self.bucket.available()
    }

    /// The number of slots the bucket can bank while idle.
    pub fn capacity(&self) -> u64 {
        self.bucket.capacity()
    }

    /// Current spacing between permits. Moves when a dynamic limit is set.
    pub fn interval(&self) -> Duration {
        self.bucket.interval()
    }
}

impl RateLimit for LeakyBucket {
    fn take(&self) -> Instant {
        self.bucket.take()
    }

    fn allow(&self) -> bool {
        self.bucket.allow()
    }
}
