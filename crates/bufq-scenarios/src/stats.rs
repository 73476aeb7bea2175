//! Shared counters collected while a scenario runs.

use parking_lot::Mutex;
use std::sync::Arc;

/// Counters accumulated by every worker thread of a scenario.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScenarioStats {
    /// Messages committed with a payload.
    pub produced: u32,
    /// Messages claimed, verified, and released.
    pub consumed: u32,
    /// Reservations abandoned via cancel.
    pub cancelled: u32,
    /// Batched reservations that came back smaller than requested.
    pub short_batches: u32,
}

impl ScenarioStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Destination for scenario counters, cloned into every worker thread.
pub trait StatsSink: Clone + Send + 'static {
    fn with_stats<R>(&self, f: impl FnOnce(&mut ScenarioStats) -> R) -> R;
}

/// Mutex-backed sink shared between the driver and its workers.
#[derive(Clone, Default)]
pub struct ArcStatsSink(pub Arc<Mutex<ScenarioStats>>);

impl ArcStatsSink {
    pub fn snapshot(&self) -> ScenarioStats {
        *self.0.lock()
    }
}

impl StatsSink for ArcStatsSink {
    fn with_stats<R>(&self, f: impl FnOnce(&mut ScenarioStats) -> R) -> R {
        let mut guard = self.0.lock();
        f(&mut guard)
    }
}

impl StatsSink for Arc<Mutex<ScenarioStats>> {
    fn with_stats<R>(&self, f: impl FnOnce(&mut ScenarioStats) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }
}
