use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// The time it takes to regenerate one unit, shared between a limiter and
/// its adjuster task.
///
/// Kept apart from the CAS'd `State` so the adjuster can
/// rewrite it with a single store while `take`/`allow` are in flight. A new
/// value applies to the next refill computation.
#[derive(Clone, Debug)]
pub(crate) struct RateParameter {
    nanos: Arc<AtomicU64>,
}

impl RateParameter {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(as_nanos(interval))),
        }
    }

    pub(crate) fn nanos(&self) -> u64 {
        self.nanos.load(Ordering::Acquire)
    }

    pub(crate) fn load(&self) -> Duration {
        Duration::from_nanos(self.nanos())
    }

    pub(crate) fn store(&self, interval: Duration) {
        self.nanos.store(as_nanos(interval), Ordering::Release);
    }
}

/// Saturating conversion; a `u64` of nanoseconds covers ~584 years.
pub(crate) fn as_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
