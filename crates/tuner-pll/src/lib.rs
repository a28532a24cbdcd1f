//! Tuner PLL Library
//!
//! Drivers for tuner modules built around a simple PLL synthesizer: the host
//! computes a divider from a static band table and writes it, together with
//! the band's control and bandswitch bytes, in a single transaction.
//!
//! - [`band`]: band tables, lookup and the staged register image
//! - [`chips`]: band plans for the supported modules
//! - [`PllDriver`]: the lifecycle shared by every module
//!
//! # Example
//!
//! ```rust
//! use tuner_core::{DigitalChannel, DigitalTuner, Lifecycle, LockState, Modulation};
//! use tuner_pll::{PllDriver, PllModel};
//! use tuner_sim::{SimBus, SimDelay};
//!
//! let bus = SimBus::new();
//! bus.push_reply(vec![0x40]);
//!
//! let mut tuner = PllDriver::with_delay(bus.clone(), PllModel::Tuv1236d, SimDelay::new());
//! tuner
//!     .set_channel(&DigitalChannel::new(Modulation::Vsb8, 503_000_000, 6_000_000))
//!     .unwrap();
//! tuner.start(2000).unwrap();
//!
//! assert_eq!(tuner.state(), LockState::Locked);
//! assert_eq!(bus.writes().len(), 1);
//! ```

pub mod band;
pub mod chips;
pub mod driver;

pub use band::{FrequencyBand, PllRegisters};
pub use chips::{BandPlan, FixedPlan, PllModel, Tuning};
pub use driver::PllDriver;
