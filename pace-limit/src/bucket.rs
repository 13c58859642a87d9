use std::time::Duration;

use quanta::Clock;
use quanta::Instant;
use tokio::task::AbortHandle;
use tracing::trace;

use crate::ConfigError;
use crate::Options;
use crate::State;
use crate::rate::RateParameter;
use crate::rate::as_nanos;
use crate::state::StateCell;

/// Refill-then-consume state machine behind both limiters.
#[derive(Debug)]
pub(crate) struct Bucket {
    capacity: u64,
    interval: RateParameter,
    state: StateCell,
    clock: Clock,
    adjuster: Option<AbortHandle>,
}

impl Bucket {
    pub(crate) fn new(rate: u64, capacity: u64, options: Options) -> Result<Self, ConfigError> {
        let Options {
            per,
            clock,
            dynamic_limit,
        } = options;

        if rate == 0 {
            return Err(ConfigError::ZeroRate);
        }
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if per.is_zero() {
            return Err(ConfigError::ZeroPer);
        }
        let interval = as_nanos(per) / rate;
        if interval == 0 {
            return Err(ConfigError::IntervalTooSmall { rate, per });
        }
        let interval = RateParameter::new(Duration::from_nanos(interval));

        let adjuster = match dynamic_limit {
            Some(limit) => Some(limit.prepare(per, interval.clone())?.spawn()?),
            None => None,
        };

        let state = StateCell::new(State {
            last: clock.now(),
            available: capacity,
        });

        Ok(Self {
            capacity,
            interval,
            state,
            clock,
            adjuster,
        })
    }

    pub(crate) fn capacity(&self) -> u64 {
        self.capacity
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval.load()
    }

    pub(crate) fn available(&self) -> u64 {
        self.state.load().available
    }

    /// Credit the units regenerated since `state.last`, capped at capacity.
    ///
    /// `last` only moves forward by the whole intervals credited, so the
    /// partial progress toward the next unit survives a grant. Once the
    /// bucket is full there is no progress to keep and `last` jumps to `now`.
    fn refill(&self, state: &State, now: Instant) -> State {
        let interval = self.interval.nanos();
        let elapsed = as_nanos(now.saturating_duration_since(state.last));
        let refilled = elapsed / interval;
        let available = state.available.saturating_add(refilled);

        if available >= self.capacity {
            State {
                last: now,
                available: self.capacity,
            }
        } else {
            State {
                last: state.last + Duration::from_nanos(refilled * interval),
                available,
            }
        }
    }

    /// One CAS attempt at consuming a unit.
    fn try_consume(&self) -> Option<State> {
        self.state.try_advance(|current| {
            let mut next = self.refill(current, self.clock.now());
            if next.available == 0 {
                return None;
            }
            next.available -= 1;
            Some(next)
        })
    }

    pub(crate) fn allow(&self) -> bool {
        self.try_consume().is_some()
    }

    pub(crate) fn take(&self) -> Instant {
        loop {
            if let Some(granted) = self.try_consume() {
                return granted.last;
            }
            let backoff = self.interval.load();
            trace!(?backoff, "no unit available, backing off");
            std::thread::sleep(backoff);
        }
    }

    pub(crate) async fn take_async(&self) -> Instant {
        loop {
            if let Some(granted) = self.try_consume() {
                return granted.last;
            }
            let backoff = self.interval.load();
            trace!(?backoff, "no unit available, backing off");
            tokio::time::sleep(backoff).await;
        }
    }
}

impl Drop for Bucket {
    fn drop(&mut self) {
        if let Some(adjuster) = self.adjuster.take() {
            adjuster.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Barrier;
    use std::sync::atomic::AtomicU64;
    use std::sync::atomic::Ordering;
    use std::thread;

    use super::*;

    fn mocked(rate: u64, capacity: u64) -> (Bucket, Arc<quanta::Mock>) {
        let (clock, mock) = Clock::mock();
        let bucket = Bucket::new(rate, capacity, Options::new().with_clock(clock))
            .expect("valid configuration");
        (bucket, mock)
    }

    #[test]
    fn it_rejects_misconfiguration() {
        assert_eq!(
            Bucket::new(0, 1, Options::new()).err(),
            Some(ConfigError::ZeroRate)
        );
        assert_eq!(
            Bucket::new(1, 0, Options::new()).err(),
            Some(ConfigError::ZeroCapacity)
        );
        assert_eq!(
            Bucket::new(1, 1, Options::new().with_per(Duration::ZERO)).err(),
            Some(ConfigError::ZeroPer)
        );
        assert_eq!(
            Bucket::new(2_000_000_000, 1, Options::new()).err(),
            Some(ConfigError::IntervalTooSmall {
                rate: 2_000_000_000,
                per: Duration::from_secs(1),
            })
        );
    }

    #[test]
    fn interval_is_per_divided_by_rate() {
        let bucket = Bucket::new(4, 1, Options::new().with_per(Duration::from_millis(100)))
            .expect("valid configuration");
        assert_eq!(bucket.interval(), Duration::from_millis(25));
    }

    #[test]
    fn it_starts_full() {
        let (bucket, _mock) = mocked(10, 7);
        assert_eq!(bucket.available(), 7);
    }

    #[test]
    fn refill_is_floored_and_capped() {
        // 100ms per unit
        let (bucket, mock) = mocked(10, 5);
        for _ in 0..5 {
            assert!(bucket.allow());
        }
        assert!(!bucket.allow());

        mock.increment(Duration::from_millis(250));
        assert!(bucket.allow());
        // two refilled, one consumed
        assert_eq!(bucket.available(), 1);

        mock.increment(Duration::from_secs(60));
        assert!(bucket.allow());
        assert_eq!(bucket.available(), 4);
    }

    #[test]
    fn partial_progress_survives_a_grant() {
        // 100ms per unit
        let (bucket, mock) = mocked(10, 5);
        for _ in 0..5 {
            assert!(bucket.allow());
        }
        let drained_at = bucket.state.load().last;

        mock.increment(Duration::from_millis(150));
        assert!(bucket.allow());
        // Only the whole interval is consumed, 50ms carries over.
        assert_eq!(
            bucket.state.load().last,
            drained_at + Duration::from_millis(100)
        );

        mock.increment(Duration::from_millis(50));
        assert!(bucket.allow());
        assert!(!bucket.allow());
    }

    #[test]
    fn repeated_allow_without_elapsed_time_stays_denied() {
        let (bucket, _mock) = mocked(10, 2);
        assert!(bucket.allow());
        assert!(bucket.allow());

        for _ in 0..1_000 {
            assert!(!bucket.allow());
        }
        assert_eq!(bucket.available(), 0);
    }

    #[test]
    fn allow_spaced_beyond_the_interval_always_succeeds() {
        let (bucket, mock) = mocked(10, 1);
        for _ in 0..100 {
            assert!(bucket.allow());
            mock.increment(Duration::from_millis(100) + Duration::from_nanos(1));
        }
    }

    #[test]
    fn a_new_interval_applies_to_the_next_refill() {
        let (bucket, mock) = mocked(10, 1);
        assert!(bucket.allow());

        bucket.interval.store(Duration::from_millis(200));
        mock.increment(Duration::from_millis(150));
        assert!(!bucket.allow());

        mock.increment(Duration::from_millis(50));
        assert!(bucket.allow());
    }

    #[test]
    fn take_returns_the_installed_timestamp() {
        let (bucket, mock) = mocked(10, 3);
        mock.increment(Duration::from_millis(5));
        let now = bucket.clock.now();

        assert_eq!(bucket.take(), now);
    }

    #[test]
    fn test_racing_allow_never_double_grants() {
        let threads = 8;
        let attempts = 500;
        let capacity = 1_000;
        let (bucket, _mock) = mocked(1, capacity);
        let bucket = Arc::new(bucket);
        let barrier = Arc::new(Barrier::new(threads));
        let granted = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let bucket = Arc::clone(&bucket);
                let barrier = Arc::clone(&barrier);
                let granted = Arc::clone(&granted);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..attempts {
                        if bucket.allow() {
                            granted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker panicked");
        }

        // Lost races may deny a caller, but a unit is never handed out twice
        // nor dropped on the floor.
        let granted = granted.load(Ordering::Relaxed);
        assert!(granted <= capacity);
        assert_eq!(granted + bucket.available(), capacity);
    }

    #[test]
    fn test_racing_take_grants_exactly_capacity() {
        let capacity = 16;
        // 1ms backoff between lost races
        let (bucket, _mock) = mocked(1_000, capacity);
        let bucket = Arc::new(bucket);
        let barrier = Arc::new(Barrier::new(capacity as usize));

        let handles: Vec<_> = (0..capacity)
            .map(|_| {
                let bucket = Arc::clone(&bucket);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    bucket.take()
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker panicked");
        }

        assert_eq!(bucket.available(), 0);
        assert!(!bucket.allow());
    }

    #[tokio::test]
    async fn take_async_waits_for_a_refill() {
        let bucket = Bucket::new(100, 1, Options::new()).expect("valid configuration");

        let first = bucket.take_async().await;
        let second = bucket.take_async().await;

        more_asserts::assert_ge!(second.duration_since(first), Duration::from_millis(10));
    }
}
