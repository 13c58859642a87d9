use std::fmt;
use std::time::Duration;

use futures::Stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::ConfigError;
use crate::rate::RateParameter;
use crate::rate::as_nanos;

/// Feedback loop that retunes a limiter's per-unit interval from an external
/// signal, e.g. CPU load in percent.
///
/// Every sample above `target` lengthens the interval by one step (fewer
/// units per `per`), every other sample shortens it by one step. The
/// interval never leaves `[per / max_rate, per / min_rate]`.
///
/// The loop runs as a tokio task for the lifetime of the limiter and stops
/// when the signal stream ends, when `cancel` fires (or its sender is
/// dropped), or when the limiter is dropped. The interval keeps its last
/// value afterwards.
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), pace_limit::ConfigError> {
/// use futures::channel::mpsc;
/// use pace_limit::DynamicLimit;
/// use pace_limit::LeakyBucket;
/// use pace_limit::Options;
/// use tokio::sync::oneshot;
///
/// let (load_tx, load_rx) = mpsc::unbounded::<f64>();
/// let (cancel_tx, cancel_rx) = oneshot::channel();
///
/// let dynamic = DynamicLimit::new(30.0, load_rx, 10, 1000, cancel_rx);
/// let limiter = LeakyBucket::with_options(10, Options::new().with_dynamic_limit(dynamic))?;
///
/// load_tx.unbounded_send(85.0).ok();
/// let _ = cancel_tx.send(());
/// # drop(limiter);
/// # Ok(())
/// # }
/// ```
pub struct DynamicLimit {
    target: f64,
    min_rate: u64,
    max_rate: u64,
    step: Option<Duration>,
    signal: BoxStream<'static, f64>,
    cancel: oneshot::Receiver<()>,
}

impl DynamicLimit {
    /// Creates a dynamic limit.
    ///
    /// # Arguments
    ///
    /// * `target` - Samples above this value tighten the limit.
    /// * `signal` - Source of samples, consumed until it ends.
    /// * `min_rate` - Lowest rate (units per `per`) the loop may settle on.
    /// * `max_rate` - Highest rate (units per `per`) the loop may settle on.
    /// * `cancel` - Stops the loop when fired or when its sender is dropped.
    ///   Keep the sender alive for as long as the loop should run: a sender
    ///   discarded at construction (`let (_, rx) = oneshot::channel()`)
    ///   stops the loop on its first poll, before any sample is applied.
    pub fn new<S>(
        target: f64,
        signal: S,
        min_rate: u64,
        max_rate: u64,
        cancel: oneshot::Receiver<()>,
    ) -> Self
    where
        S: Stream<Item = f64> + Send + 'static,
    {
        Self {
            target,
            min_rate,
            max_rate,
            step: None,
            signal: signal.boxed(),
            cancel,
        }
    }

    /// How far a single sample moves the interval.
    ///
    /// Defaults to a tenth of the distance between the two bounds.
    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = Some(step);
        self
    }

    /// Validates the bounds against `per` and clamps the current interval
    /// into them.
    pub(crate) fn prepare(
        self,
        per: Duration,
        interval: RateParameter,
    ) -> Result<PreparedLimit, ConfigError> {
        if !self.target.is_finite() {
            return Err(ConfigError::InvalidTarget(self.target));
        }

        let invalid = ConfigError::InvalidBounds {
            min_rate: self.min_rate,
            max_rate: self.max_rate,
        };
        if self.min_rate == 0 || self.min_rate > self.max_rate {
            return Err(invalid);
        }
        let per_ns = as_nanos(per);
        let min = per_ns / self.max_rate;
        let max = per_ns / self.min_rate;
        if min == 0 {
            return Err(invalid);
        }
        let min = Duration::from_nanos(min);
        let max = Duration::from_nanos(max);

        let step = match self.step {
            Some(step) if step.is_zero() => return Err(ConfigError::ZeroStep),
            Some(step) => step,
            None => ((max - min) / 10).max(Duration::from_nanos(1)),
        };

        interval.store(interval.load().clamp(min, max));

        Ok(PreparedLimit {
            adjuster: Adjuster {
                target: self.target,
                min,
                max,
                step,
                interval,
            },
            signal: self.signal,
            cancel: self.cancel,
        })
    }
}

impl fmt::Debug for DynamicLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicLimit")
            .field("target", &self.target)
            .field("min_rate", &self.min_rate)
            .field("max_rate", &self.max_rate)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

/// A validated [`DynamicLimit`] that is ready to be spawned.
pub(crate) struct PreparedLimit {
    adjuster: Adjuster,
    signal: BoxStream<'static, f64>,
    cancel: oneshot::Receiver<()>,
}

impl PreparedLimit {
    pub(crate) fn spawn(self) -> Result<AbortHandle, ConfigError> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        let task = runtime.spawn(self.adjuster.run(self.signal, self.cancel));
        Ok(task.abort_handle())
    }
}

/// The directional step policy.
///
/// The adjuster is the only writer of its [`RateParameter`], so reading the
/// current value and storing the next one cannot lose an update.
#[derive(Debug)]
pub(crate) struct Adjuster {
    target: f64,
    min: Duration,
    max: Duration,
    step: Duration,
    interval: RateParameter,
}

impl Adjuster {
    /// Applies one sample and returns the resulting interval.
    pub(crate) fn adjust(&self, sample: f64) -> Duration {
        let current = self.interval.load();
        if sample.is_nan() {
            warn!(threshold = self.target, "ignoring NaN load sample");
            return current;
        }

        let next = if sample > self.target {
            current.saturating_add(self.step)
        } else {
            current.saturating_sub(self.step)
        }
        .clamp(self.min, self.max);

        if next != current {
            self.interval.store(next);
            debug!(
                sample,
                threshold = self.target,
                from = ?current,
                to = ?next,
                "adjusted per-unit interval"
            );
        }
        next
    }

    pub(crate) async fn run(
        self,
        mut signal: BoxStream<'static, f64>,
        mut cancel: oneshot::Receiver<()>,
    ) {
        info!(
            min_interval = ?self.min,
            max_interval = ?self.max,
            step = ?self.step,
            "dynamic limit started"
        );

        let reason = loop {
            tokio::select! {
                // Cancellation wins over a ready sample.
                biased;
                _ = &mut cancel => break "cancelled",
                sample = signal.next() => match sample {
                    Some(sample) => {
                        self.adjust(sample);
                    }
                    None => break "signal closed",
                },
            }
        };

        info!(reason, interval = ?self.interval.load(), "dynamic limit stopped");
    }
}
