// gore_server/server/src/core/time.rs
use super::types::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic millisecond clock consumed by the simulation.
pub trait TimeSource: Send + Sync {
    fn get_time(&self) -> Timestamp;
}

/// Milliseconds elapsed since the clock was created.
#[derive(Debug)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock { start: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn get_time(&self) -> Timestamp {
        self.start.elapsed().as_millis() as Timestamp
    }
}

/// Hand-driven clock for deterministic tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        ManualClock { now: AtomicU64::new(start) }
    }

    pub fn set(&self, t: Timestamp) {
        self.now.store(t, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) -> Timestamp {
        self.now.fetch_add(ms, Ordering::SeqCst) + ms
    }
}

impl TimeSource for ManualClock {
    fn get_time(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
