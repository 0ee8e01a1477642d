//! Latency timers.
//!
//! A [`Timer`] aggregates durations recorded through [`TimerContext`]
//! guards. Only contexts that are explicitly stopped are recorded, so
//! failed operations do not skew the figures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared latency aggregate
#[derive(Clone)]
pub struct Timer {
    inner: Arc<TimerInner>,
}

struct TimerInner {
    name: &'static str,
    count: AtomicU64,
    total_micros: AtomicU64,
    max_micros: AtomicU64,
}

/// Point-in-time view of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub count: u64,
    pub total: Duration,
    pub max: Duration,
}

impl TimerSnapshot {
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros((self.total.as_micros() / u128::from(self.count)) as u64)
        }
    }
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                name,
                count: AtomicU64::new(0),
                total_micros: AtomicU64::new(0),
                max_micros: AtomicU64::new(0),
            }),
        }
    }

    /// Start timing one operation
    pub fn time(&self) -> TimerContext {
        TimerContext {
            timer: self.clone(),
            start: Instant::now(),
        }
    }

    /// Record a completed operation
    pub fn record(&self, elapsed: Duration) {
        let micros = elapsed.as_micros().min(u64::MAX as u128) as u64;
        self.inner.count.fetch_add(1, Ordering::Relaxed);
        self.inner.total_micros.fetch_add(micros, Ordering::Relaxed);
        self.inner.max_micros.fetch_max(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            count: self.inner.count.load(Ordering::Relaxed),
            total: Duration::from_micros(self.inner.total_micros.load(Ordering::Relaxed)),
            max: Duration::from_micros(self.inner.max_micros.load(Ordering::Relaxed)),
        }
    }
}

/// Running measurement; dropped without `stop` it records nothing
pub struct TimerContext {
    timer: Timer,
    start: Instant,
}

impl TimerContext {
    /// Finish the measurement and record it
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();
        self.timer.record(elapsed);
        tracing::debug!(
            timer = self.timer.inner.name,
            elapsed_us = elapsed.as_micros() as u64,
            "timer stopped"
        );
        elapsed
    }
}
