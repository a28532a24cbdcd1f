//! Tuner Simulator
//!
//! Test doubles for driving tuner engines without hardware:
//!
//! - [`SimBus`]: a scripted bus device that records every transaction
//! - [`SimDelay`]: a virtual clock that records time instead of sleeping
//!
//! # Example
//!
//! ```rust
//! use tuner_core::{DelayNs, Transport};
//! use tuner_sim::{SimBus, SimDelay};
//!
//! let clock = SimDelay::new();
//! let bus = SimBus::new().with_clock(&clock);
//! bus.push_reply(vec![0x40]);
//!
//! let mut driver_bus = bus.clone();
//! let mut driver_delay = clock.clone();
//! driver_bus.write(&[0x0C, 0x40]).unwrap();
//! driver_delay.delay_ms(50);
//! let mut status = [0u8; 1];
//! driver_bus.read(&mut status).unwrap();
//!
//! assert_eq!(status, [0x40]);
//! assert_eq!(bus.writes(), vec![vec![0x0C, 0x40]]);
//! assert_eq!(clock.elapsed_ms(), 50);
//! ```

pub mod bus;
pub mod clock;

pub use bus::{BusEvent, Responder, SimBus};
pub use clock::SimDelay;

/// Route `tracing` output to the test harness, honouring `RUST_LOG`
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
