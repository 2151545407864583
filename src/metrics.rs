use std::cell::Cell;

/// Running counters for one executor.
#[derive(Debug, Default)]
pub struct ExecutorMetrics {
    loaders_registered: Cell<usize>,
    resolutions: Cell<usize>,
    resolution_failures: Cell<usize>,
    ticks: Cell<usize>,
    discarded: Cell<usize>,
}

impl ExecutorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_registration(&self) {
        bump(&self.loaders_registered, 1);
    }

    pub(crate) fn record_resolution(&self, succeeded: bool) {
        bump(&self.resolutions, 1);
        if !succeeded {
            bump(&self.resolution_failures, 1);
        }
    }

    pub(crate) fn record_tick(&self) {
        bump(&self.ticks, 1);
    }

    pub(crate) fn record_discarded(&self, count: usize) {
        bump(&self.discarded, count);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            loaders_registered: self.loaders_registered.get(),
            resolutions: self.resolutions.get(),
            resolution_failures: self.resolution_failures.get(),
            ticks: self.ticks.get(),
            discarded: self.discarded.get(),
        }
    }
}

fn bump(counter: &Cell<usize>, by: usize) {
    counter.set(counter.get().saturating_add(by));
}

/// Point-in-time copy of [`ExecutorMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub loaders_registered: usize,
    /// Resolve bodies entered, whether through `tick` or a direct `resolve`.
    pub resolutions: usize,
    pub resolution_failures: usize,
    pub ticks: usize,
    /// Pending loaders dropped by `clear` without being resolved.
    pub discarded: usize,
}

impl MetricsSnapshot {
    /// Get success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.resolutions == 0 {
            100.0
        } else {
            let succeeded = self.resolutions - self.resolution_failures;
            (succeeded as f64 / self.resolutions as f64) * 100.0
        }
    }
}
