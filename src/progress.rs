//! Load progress aggregation across both streams of an archive.
//!
//! Records only know how many frames they have materialized, never their
//! place in the whole archive. They report relative work units through
//! [`ProgressSink`] and the [`ProgressAggregator`] owns the only total.

use parking_lot::Mutex;

/// Callback receiving `(percentage, done, total)` after each unit of work.
pub type LoadProgress = Box<dyn Fn(f64, usize, usize) + Send + Sync>;

/// Narrow "N frames completed" interface a record reports through.
pub trait ProgressSink: Send + Sync {
    fn frames_done(&self, n: usize);
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressState {
    pub done: usize,
    pub total: usize,
}

impl ProgressState {
    /// Percentage of completed frames. An empty workload counts as complete.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.done as f64 / self.total as f64 * 100.0
        }
    }
}

/// Single-writer accumulator shared by the records of one archive.
///
/// The callback runs while the state lock is held so reports from two
/// records compiling concurrently are still delivered in `done` order. The
/// callback must not call back into the aggregator.
#[derive(Default)]
pub struct ProgressAggregator {
    state: Mutex<ProgressState>,
    callback: Mutex<Option<LoadProgress>>,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the external callback.
    pub fn set_callback(&self, callback: Option<LoadProgress>) {
        *self.callback.lock() = callback;
    }

    /// Start a new unit of work of `total` frames.
    pub fn reset(&self, total: usize) {
        *self.state.lock() = ProgressState { done: 0, total };
    }

    pub fn snapshot(&self) -> ProgressState {
        *self.state.lock()
    }
}

impl ProgressSink for ProgressAggregator {
    fn frames_done(&self, n: usize) {
        let mut state = self.state.lock();
        state.done += n;
        let perc = state.percentage();
        if let Some(cb) = self.callback.lock().as_ref() {
            cb(perc, state.done, state.total);
        }
    }
}
