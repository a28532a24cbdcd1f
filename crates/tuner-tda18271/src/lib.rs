//! TDA18271 Silicon Tuner
//!
//! Driver for both revisions of the TDA18271. The host mirrors the chip's
//! register map, calibrates the image-rejection mixers at start-up and, on the
//! second revision, fits an RF tracking-filter curve that is corrected for die
//! temperature on every tune.
//!
//! - [`regs`]: register addresses and the shadow register file
//! - [`tables`]: frequency-indexed constants for the synthesizers and filters
//! - [`curve`]: tracking-filter curve fitting and temperature correction
//! - [`Tda18271`]: the driver and its lifecycle
//!
//! # Example
//!
//! ```rust
//! use tuner_core::{DigitalChannel, DigitalTuner, Lifecycle, LockState, Modulation};
//! use tuner_sim::{SimBus, SimDelay};
//! use tuner_tda18271::{Mode, Tda18271, Version};
//!
//! // First-revision chip: every read returns ID 0x83
//! let bus = SimBus::new();
//! bus.set_responder(|_, out| out[0] = 0x83);
//!
//! let mut tuner = Tda18271::with_delay(bus.clone(), SimDelay::new(), Mode::Single).unwrap();
//! assert_eq!(tuner.get_version(), Version::V1);
//!
//! tuner
//!     .set_channel(&DigitalChannel::new(Modulation::Vsb8, 503_000_000, 6_000_000))
//!     .unwrap();
//! tuner.start(100).unwrap();
//! assert_eq!(tuner.state(), LockState::Locked);
//! ```

mod calibration;
pub mod curve;
pub mod driver;
pub mod regs;
pub mod tables;

pub use curve::{Anchor, FilterCurve};
pub use driver::{IfHook, IfSettings, Mode, Tda18271, Version};
pub use regs::{Reg, RegisterFile};
