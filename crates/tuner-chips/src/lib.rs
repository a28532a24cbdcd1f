//! Firmware-driven Tuner Chips
//!
//! Drivers for parts that run host-supplied firmware:
//!
//! - [`or51132`]: 8-VSB/QAM demodulator with one flat image per modulation family
//! - [`xc5000`]: silicon tuner programmed through 16-bit registers after a
//!   byte-code firmware upload
//! - [`xc3028`]: silicon tuner fed from a multi-section firmware blob
//! - [`nxt2004`]: 8-VSB/QAM demodulator whose microcontroller image is
//!   uploaded with a CRC on every start-up
//! - [`s5h1411`]: register-programmed 8-VSB/QAM demodulator with a
//!   separate QAM core
//!
//! The firmware-driven parts name their files through the configuration
//! store. OR51132 and XC5000 skip the upload when the file has not changed
//! since it was last applied; XC3028 skips sections the chip already holds.
//!
//! # Example
//!
//! ```rust
//! use tuner_chips::Xc5000;
//! use tuner_core::{DigitalChannel, DigitalTuner, MapConfig, Modulation, TunerError};
//! use tuner_sim::{SimBus, SimDelay};
//!
//! // Product ID register reports running firmware
//! let bus = SimBus::new();
//! bus.set_responder(|last, out| {
//!     if last[..] == [0x00, 0x08] {
//!         out.copy_from_slice(&0x1388u16.to_be_bytes());
//!     }
//! });
//!
//! let mut tuner = Xc5000::with_delay(bus.clone(), MapConfig::new(), SimDelay::new(), 5_380_000).unwrap();
//! assert!(tuner.firmware_loaded());
//!
//! // Requests the chip cannot honour are refused before touching the bus
//! bus.clear_events();
//! let channel = DigitalChannel::new(Modulation::Qpsk, 1_200_000_000, 8_000_000);
//! assert!(matches!(tuner.set_channel(&channel), Err(TunerError::InvalidArgument(_))));
//! assert!(bus.events().is_empty());
//! ```

pub mod nxt2004;
pub mod or51132;
pub mod s5h1411;
pub mod xc3028;
pub mod xc5000;

pub use nxt2004::Nxt2004;
pub use or51132::{DemodMode, Or51132};
pub use s5h1411::S5h1411;
pub use xc3028::{FirmwareFlags, Xc3028};
pub use xc5000::{Programming, SignalSource, Xc5000};
