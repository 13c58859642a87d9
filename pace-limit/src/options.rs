use std::time::Duration;

use quanta::Clock;

use crate::DynamicLimit;

/// Construction-time settings shared by [`LeakyBucket`](crate::LeakyBucket)
/// and [`TokenBucket`](crate::TokenBucket).
#[derive(Debug)]
pub struct Options {
    pub(crate) per: Duration,
    pub(crate) clock: Clock,
    pub(crate) dynamic_limit: Option<DynamicLimit>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            per: Duration::from_secs(1),
            clock: Clock::new(),
            dynamic_limit: None,
        }
    }
}

impl Options {
    /// Defaults: rates are per second, real clock, no dynamic limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// The time unit the rate is expressed against.
    pub fn with_per(mut self, per: Duration) -> Self {
        self.per = per;
        self
    }

    /// Source of time for refill arithmetic.
    ///
    /// Pass a [`Clock::mock`] clock for deterministic tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Retune the rate at runtime from an external signal.
    ///
    /// The limiter must then be built inside a tokio runtime.
    pub fn with_dynamic_limit(mut self, dynamic_limit: DynamicLimit) -> Self {
        self.dynamic_limit = Some(dynamic_limit);
        self
    }
}
