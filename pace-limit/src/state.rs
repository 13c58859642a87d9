use std::sync::Arc;

use arc_swap::ArcSwap;
use quanta::Instant;

/// A point-in-time view of a bucket.
///
/// Snapshots are never mutated in place. Every successful transition
/// installs a fresh one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct State {
    /// When the bucket was last refilled.
    pub last: Instant,
    /// Units available as of `last`.
    pub available: u64,
}

/// Atomic reference to the current [`State`].
///
/// The only way to change the current snapshot is [`StateCell::try_advance`],
/// which performs a single compare-and-swap against the snapshot it loaded.
/// A loaded snapshot stays allocated while its guard is held, so pointer
/// equality identifies it exactly.
#[derive(Debug)]
pub(crate) struct StateCell {
    current: ArcSwap<State>,
}

impl StateCell {
    pub(crate) fn new(initial: State) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Copy of the current snapshot.
    pub(crate) fn load(&self) -> State {
        **self.current.load()
    }

    /// Load the current snapshot, derive a candidate from it and try to
    /// install the candidate with one CAS.
    ///
    /// Returns the installed snapshot, or `None` if `compute` declined or
    /// another caller installed a snapshot first. Callers decide whether to
    /// retry.
    pub(crate) fn try_advance<F>(&self, compute: F) -> Option<State>
    where
        F: FnOnce(&State) -> Option<State>,
    {
        let observed = self.current.load();
        let next = compute(&observed)?;

        let previous = self.current.compare_and_swap(&observed, Arc::new(next));
        if Arc::ptr_eq(&observed, &previous) {
            Some(next)
        } else {
            None
        }
    }
}
