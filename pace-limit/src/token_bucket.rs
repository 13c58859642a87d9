use std::time::Duration;

use quanta::Instant;

use crate::ConfigError;
use crate::Options;
use crate::RateLimit;
use crate::bucket::Bucket;

/// A burstable pool of tokens.
///
/// Tokens regenerate at `rate` per `per` and accumulate up to `capacity`, so
/// an idle bucket absorbs a burst of `capacity` requests before throttling
/// back to the sustained rate.
///
/// Partial progress toward the next token is kept across grants, so a caller
/// polling faster than the refill interval still sees the full sustained
/// rate. Time spent with a full bucket banks nothing.
///
/// Grants are not FIFO: when several callers race, whichever wins the CAS
/// gets the token, regardless of who arrived first. A token is never handed
/// out twice.
#[derive(Debug)]
pub struct TokenBucket {
    bucket: Bucket,
}

impl TokenBucket {
    /// Creates a `TokenBucket` refilling `rate` tokens per second.
    ///
    /// # Arguments
    ///
    /// * `rate` - Tokens regenerated per second.
    /// * `capacity` - The maximum number of tokens the bucket holds.
    pub fn new(rate: u64, capacity: u64) -> Result<Self, ConfigError> {
        Self::with_options(rate, capacity, Options::default())
    }

    /// Creates a `TokenBucket` refilling `rate` tokens per `options.per`.
    pub fn with_options(rate: u64, capacity: u64, options: Options) -> Result<Self, ConfigError> {
        Ok(Self {
            bucket: Bucket::new(rate, capacity, options)?,
        })
    }

    /// Waits for a token without blocking the executor thread.
    pub async fn take_async(&self) -> Instant {
        self.bucket.take_async().await
    }

    /// Tokens recorded in the current snapshot, before any pending refill.
    pub fn available(&self) -> u64 {
        self.bucket.available()
    }

    /// The maximum number of tokens the bucket holds.
    pub fn capacity(&self) -> u64 {
        self.bucket.capacity()
    }

    /// Time to regenerate one token.
    pub fn interval(&self) -> Duration {
        self.bucket.interval()
    }
}

impl RateLimit for TokenBucket {
    fn take(&self) -> Instant {
        self.bucket.take()
    }

    fn allow(&self) -> bool {
        self.bucket.allow()
    }
}
