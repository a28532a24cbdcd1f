//! Capability traits
//!
//! A chip implements whichever roles it can play. A combined tuner exposes
//! both [`DigitalTuner`] and [`AnalogTuner`] over one register state; the
//! caller picks behaviour by the trait it calls through.

use crate::channel::{AnalogChannel, DigitalChannel, InterfaceNegotiation, SignalQuality};
use crate::error::Result;
use crate::lock::LockState;

/// Start/stop/reset, shared by every driver
pub trait Lifecycle {
    /// Short chip name for logs
    fn name(&self) -> &'static str;

    /// Current lock state
    fn state(&self) -> LockState;

    /// Commit the staged channel and block until lock or `timeout_ms`
    fn start(&mut self, timeout_ms: u32) -> Result<()>;

    /// Put the chip in standby, keeping the staged channel
    fn stop(&mut self) -> Result<()>;

    /// Stop and forget the staged channel and any cached calibration
    fn reset(&mut self) -> Result<()>;
}

/// Digital television reception
pub trait DigitalTuner: Lifecycle {
    /// Stage a digital channel and report the output interface it requires
    fn set_channel(&mut self, channel: &DigitalChannel) -> Result<InterfaceNegotiation>;

    /// Live signal quality; zeroed when the chip cannot measure it
    fn get_signal(&mut self) -> Result<SignalQuality> {
        Ok(SignalQuality::default())
    }
}

/// Analog television and FM radio reception
pub trait AnalogTuner: Lifecycle {
    /// Stage an analog channel
    fn set_channel(&mut self, channel: &AnalogChannel) -> Result<()>;
}
