//! Tuner Core Library
//!
//! Shared building blocks for TV/radio tuner front-end drivers:
//!
//! - **Channel model**: digital and analog channel requests, interface
//!   negotiation results and signal quality
//! - **Capabilities**: [`Lifecycle`], [`DigitalTuner`] and [`AnalogTuner`],
//!   implemented per chip against one owned state block
//! - **Transport**: byte-level `write`/`read`/`transact` to one bus address,
//!   with an adapter for embedded-hal I2C buses
//! - **Configuration**: chained key lookup with environment overrides and a
//!   managed directory for firmware staleness sidecars
//! - **Lock acquisition**: the Unconfigured/Configured/Locked state machine
//!   and its bounded poll loop
//!
//! # Architecture
//!
//! Drivers are synchronous. Every bus transaction, settling delay and lock
//! poll blocks the calling thread. Delays go through embedded-hal's
//! [`DelayNs`] so a virtual clock can stand in during tests, and
//! [`I2cDevice`] binds any embedded-hal I2C bus to one chip address. One
//! driver instance serves one caller at a time (`&mut self` everywhere).
//!
//! Logging uses `tracing`. Without a subscriber installed every log call is a
//! no-op; hosts wire up their own subscriber at startup.
//!
//! # Example
//!
//! ```rust
//! use tuner_core::{ConfigExt, DigitalChannel, MapConfig, Modulation};
//!
//! let config = MapConfig::new().with("OR51132_LOCK_TIMEOUT", "2000");
//! assert_eq!(config.get_number::<u32>("or51132_lock_timeout", 500), 2000);
//!
//! let channel = DigitalChannel::new(Modulation::Vsb8, 503_000_000, 6_000_000);
//! assert_eq!(channel.modulation().capability(), 1 << 1);
//! ```

pub mod channel;
pub mod config;
pub mod delay;
pub mod driver;
pub mod error;
pub mod lock;
pub mod transport;

pub use channel::{
    AnalogChannel, AudioFormat, BitOrder, ClockMode, ClockPolarity, CodeRate, DigitalChannel,
    GuardInterval, Hierarchy, InterfaceNegotiation, Inversion, Modulation, ModulationSettings,
    OfdmConstellation, OfdmSettings, QamAnnex, QamSettings, QpskSettings, SignalQuality,
    TransmissionMode, VideoFormat,
};
pub use config::{ChainedConfig, ConfigExt, ConfigStore, EnvConfig, MapConfig};
pub use delay::{DelayNs, StdDelay};
pub use driver::{AnalogTuner, DigitalTuner, Lifecycle};
pub use error::{Result, TunerError};
pub use lock::{poll_until_locked, LockState, LOCK_POLL_INTERVAL_MS};
pub use transport::{write_chunked, I2cDevice, Transport};
