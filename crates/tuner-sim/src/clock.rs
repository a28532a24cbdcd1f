//! Virtual clock

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tuner_core::DelayNs;

/// A [`DelayNs`] that advances a shared counter instead of sleeping
///
/// Clones share the counter, so a test can hand one to a driver and read
/// the elapsed time from another.
#[derive(Debug, Clone, Default)]
pub struct SimDelay {
    elapsed_ns: Arc<AtomicU64>,
    calls: Arc<AtomicU64>,
}

impl SimDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total virtual time slept, in microseconds
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_ns.load(Ordering::SeqCst) / 1000
    }

    /// Total virtual time slept, in whole milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_us() / 1000
    }

    /// Number of delay calls made
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn advance(&self, ns: u64) {
        self.elapsed_ns.fetch_add(ns, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

// All three are overridden so one driver call counts once.
impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.advance(u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.advance(u64::from(us) * 1000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(u64::from(ms) * 1_000_000);
    }
}
