use std::time::Duration;

/// Errors produced when a limiter is constructed with unusable parameters.
///
/// All validation happens up front so that `take` and `allow` never divide by
/// zero or spin forever.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The rate must permit at least one unit per `per`.
    #[error("rate must be greater than zero")]
    ZeroRate,

    /// The bucket must be able to hold at least one unit.
    #[error("capacity must be greater than zero")]
    ZeroCapacity,

    /// The time unit the rate is expressed against must be non-zero.
    #[error("per must be a non-zero duration")]
    ZeroPer,

    /// `per / rate` truncates to zero nanoseconds.
    #[error("rate of {rate} per {per:?} needs an interval shorter than one nanosecond")]
    IntervalTooSmall {
        /// The requested rate.
        rate: u64,
        /// The time unit the rate is expressed against.
        per: Duration,
    },

    /// The dynamic limit bounds are empty or produce a zero interval.
    #[error("invalid dynamic limit bounds: min rate {min_rate}, max rate {max_rate}")]
    InvalidBounds {
        /// Lowest rate the adjuster may settle on.
        min_rate: u64,
        /// Highest rate the adjuster may settle on.
        max_rate: u64,
    },

    /// The dynamic limit target is NaN or infinite.
    #[error("dynamic limit target must be finite, got {0}")]
    InvalidTarget(f64),

    /// The dynamic limit step must move the interval.
    #[error("dynamic limit step must be a non-zero duration")]
    ZeroStep,

    /// A dynamic limit was requested outside of a tokio runtime.
    #[error("dynamic limit requires a running tokio runtime")]
    NoRuntime,
}
