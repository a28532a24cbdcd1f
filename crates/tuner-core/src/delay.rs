//! Blocking delays between dependent bus operations
//!
//! Drivers sleep through [`DelayNs`] so any embedded-hal delay provider, or a
//! virtual clock in tests, can stand in for the thread sleep.

use std::thread;
use std::time::Duration;

pub use embedded_hal::delay::DelayNs;

/// Sleeps the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_us(&mut self, us: u32) {
        thread::sleep(Duration::from_micros(u64::from(us)));
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
