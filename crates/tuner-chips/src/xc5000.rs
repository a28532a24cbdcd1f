//! XC5000 silicon tuner
//!
//! Registers are 16 bits wide behind a 16-bit address. After every register
//! write the chip is busy until the BUSY register reads zero. The firmware is
//! a byte-code stream; its reset records call a board hook that pulses the
//! tuner's reset line.

use tracing::{debug, info, trace, warn};
use tuner_core::{
    poll_until_locked, AnalogChannel, AnalogTuner, AudioFormat, ConfigStore, DelayNs,
    DigitalChannel, DigitalTuner, InterfaceNegotiation, Lifecycle, LockState, Modulation, Result,
    StdDelay, Transport, TunerError, VideoFormat, LOCK_POLL_INTERVAL_MS,
};
use tuner_firmware::{bytecode, FirmwareImage, ResetHook};

const NAME: &str = "XC5000";

/// Configuration key naming the firmware file
pub const FIRMWARE_KEY: &str = "XC5000_FW";

/// Configuration key overriding the signal source (`air` or `cable`)
pub const SOURCE_KEY: &str = "XC5000_SOURCE";

/// Product ID reported once firmware is running
pub const PRODUCT_ID_LOADED: u16 = 0x1388;

/// Product ID reported before firmware is loaded
pub const PRODUCT_ID_EMPTY: u16 = 0x2000;

/// Input frequency bounds
pub const MIN_FREQUENCY_HZ: u32 = 1_000_000;
pub const MAX_FREQUENCY_HZ: u32 = 1_023_000_000;

/// Input frequency register resolution
const FREQUENCY_STEP_HZ: u32 = 15_625;

const BUSY_TIMEOUT_MS: u32 = 1000;
const BUSY_POLL_MS: u32 = 10;
const INIT_SETTLE_MS: u32 = 100;

/// Writable registers
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteReg {
    Init = 0x00,
    VideoMode = 0x01,
    AudioMode = 0x02,
    InputFreq = 0x03,
    OutputFreq = 0x05,
    SignalSource = 0x0D,
}

/// Readable registers
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadReg {
    Lock = 0x04,
    ProductId = 0x08,
    Busy = 0x09,
}

/// RF input the chip listens on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SignalSource {
    Air = 0,
    Cable = 1,
}

impl SignalSource {
    pub fn for_modulation(modulation: Modulation) -> Result<Self> {
        match modulation {
            Modulation::Vsb8 | Modulation::Vsb16 | Modulation::Ofdm => Ok(SignalSource::Air),
            Modulation::Qam64 | Modulation::Qam256 | Modulation::QamAuto => {
                Ok(SignalSource::Cable)
            }
            other => Err(TunerError::InvalidArgument(format!(
                "{NAME}: {other} is not supported"
            ))),
        }
    }

    /// Parse a configuration value, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("air") {
            Some(SignalSource::Air)
        } else if value.eq_ignore_ascii_case("cable") {
            Some(SignalSource::Cable)
        } else {
            None
        }
    }
}

/// Everything written for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Programming {
    pub source: SignalSource,
    pub video_mode: u16,
    pub audio_mode: u16,
    /// IF output register, digital channels only
    pub output_freq: Option<u16>,
    pub input_freq: u16,
}

/// Input frequency register value
pub fn input_freq_reg(frequency_hz: i64) -> Result<u16> {
    let valid = i64::from(MIN_FREQUENCY_HZ)..=i64::from(MAX_FREQUENCY_HZ);
    if !valid.contains(&frequency_hz) {
        return Err(TunerError::InvalidArgument(format!(
            "{NAME}: {frequency_hz} Hz is outside {MIN_FREQUENCY_HZ}..={MAX_FREQUENCY_HZ} Hz"
        )));
    }
    Ok((frequency_hz / i64::from(FREQUENCY_STEP_HZ)) as u16)
}

/// IF output register value for `ifreq_hz`
pub fn output_freq_reg(ifreq_hz: u32) -> u16 {
    ((ifreq_hz / 1000) * 1024 / 1000) as u16
}

/// Video mode and frequency offset for a digital channel bandwidth
fn digital_video_mode(bandwidth_hz: u32) -> Result<(u16, i64)> {
    match bandwidth_hz {
        6_000_000 => Ok((0x8002, -1_750_000)),
        7_000_000 => Ok((0x8007, 0)),
        8_000_000 => Ok((0x800B, 0)),
        other => Err(TunerError::InvalidArgument(format!(
            "{NAME}: {other} Hz bandwidth is not supported"
        ))),
    }
}

/// Video and audio mode registers for an analog channel
pub fn analog_modes(video: VideoFormat, audio: AudioFormat) -> Result<(u16, u16)> {
    use AudioFormat as A;
    use VideoFormat as V;
    let modes = match video {
        V::NtscM | V::NtscN | V::NtscJ | V::PalM | V::PalN | V::PalNc => {
            let audio_mode = match audio {
                A::A2 | A::A2Sap => 0x0600,
                A::Eiaj | A::EiajSap => 0x0440,
                A::Btsc | A::BtscSap => 0x0400,
                _ => 0x0478,
            };
            (0x8020, audio_mode)
        }
        V::PalB | V::PalG => match audio {
            A::A2 | A::A2Sap => (0x8049, 0x0A00),
            A::Nicam | A::NicamSap => (0x8049, 0x0C04),
            _ => (0x8059, 0x0878),
        },
        V::PalI => match audio {
            A::Nicam | A::NicamSap => (0x8009, 0x1080),
            _ => (0x8009, 0x0E78),
        },
        V::PalD | V::PalD1 | V::PalK => match audio {
            A::A2 | A::A2Sap => (0x8009, 0x1600),
            A::Nicam | A::NicamSap => (0x8009, 0x0E80),
            _ => (0x8009, 0x1478),
        },
        V::SecamD | V::SecamK | V::SecamK1 => match audio {
            A::A2 | A::A2Sap => (0x8009, 0x1200),
            _ => (0x8009, 0x1478),
        },
        V::SecamL => (0x0009, 0x8E82),
        V::SecamLc => (0x4009, 0x8E82),
        V::None if audio.is_fm_radio() => (0x9002, 0x0208),
        other => {
            return Err(TunerError::InvalidArgument(format!(
                "{NAME}: {other:?} with {audio:?} audio is not supported"
            )))
        }
    };
    Ok(modes)
}

fn read_reg<T: Transport + ?Sized>(bus: &mut T, reg: ReadReg) -> Result<u16> {
    let mut data = [0u8; 2];
    bus.transact(&(reg as u16).to_be_bytes(), &mut data)?;
    let value = u16::from_be_bytes(data);
    trace!("{} read {:?} = {:#06x}", NAME, reg, value);
    Ok(value)
}

/// Driver for one XC5000 tuner
pub struct Xc5000<T, C, D = StdDelay> {
    bus: T,
    config: C,
    delay: D,
    ifreq_hz: u32,
    firmware_loaded: bool,
    reset_hook: Option<ResetHook>,
    state: LockState,
    programmed: Option<Programming>,
}

impl<T, C, D> std::fmt::Debug for Xc5000<T, C, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Xc5000")
            .field("ifreq_hz", &self.ifreq_hz)
            .field("firmware_loaded", &self.firmware_loaded)
            .field("state", &self.state)
            .field("programmed", &self.programmed)
            .finish_non_exhaustive()
    }
}

impl<T: Transport, C: ConfigStore> Xc5000<T, C, StdDelay> {
    pub fn new(bus: T, config: C, ifreq_hz: u32) -> Result<Self> {
        Self::with_delay(bus, config, StdDelay, ifreq_hz)
    }
}

impl<T: Transport, C: ConfigStore, D: DelayNs> Xc5000<T, C, D> {
    /// Create a driver for a tuner feeding a demodulator at `ifreq_hz`
    ///
    /// Reads the product ID to learn whether firmware is already running.
    pub fn with_delay(bus: T, config: C, delay: D, ifreq_hz: u32) -> Result<Self> {
        let mut tuner = Self {
            bus,
            config,
            delay,
            ifreq_hz,
            firmware_loaded: false,
            reset_hook: None,
            state: LockState::Unconfigured,
            programmed: None,
        };
        match read_reg(&mut tuner.bus, ReadReg::ProductId)? {
            PRODUCT_ID_LOADED => tuner.firmware_loaded = true,
            PRODUCT_ID_EMPTY => {}
            other => warn!("{}: unexpected product ID {:#06x}", NAME, other),
        }
        debug!("{}: firmware loaded: {}", NAME, tuner.firmware_loaded);
        Ok(tuner)
    }

    /// Install the hook run for reset records in the firmware stream
    pub fn with_reset_hook(mut self, hook: impl FnMut() -> Result<()> + Send + 'static) -> Self {
        self.reset_hook = Some(Box::new(hook));
        self
    }

    pub fn firmware_loaded(&self) -> bool {
        self.firmware_loaded
    }

    /// Registers written by the last tuning call
    pub fn programmed(&self) -> Option<&Programming> {
        self.programmed.as_ref()
    }

    /// Write a register and wait for the chip to finish with it
    fn write_reg(&mut self, reg: WriteReg, data: u16) -> Result<()> {
        let [addr_hi, addr_lo] = (reg as u16).to_be_bytes();
        let [data_hi, data_lo] = data.to_be_bytes();
        trace!("{} write {:?} = {:#06x}", NAME, reg, data);
        self.bus.write(&[addr_hi, addr_lo, data_hi, data_lo])?;

        let bus = &mut self.bus;
        let idle = || -> Result<bool> { Ok(read_reg(bus, ReadReg::Busy)? == 0) };
        poll_until_locked(&mut self.delay, BUSY_TIMEOUT_MS, BUSY_POLL_MS, idle)?;
        Ok(())
    }

    fn load_firmware(&mut self) -> Result<()> {
        let mut image = FirmwareImage::from_config(&self.config, FIRMWARE_KEY)?;
        if self.firmware_loaded && image.up_to_date() {
            debug!("{}: firmware {} is current", NAME, image.path().display());
            return Ok(());
        }
        info!("{}: loading firmware {}", NAME, image.path().display());
        let hook = &mut self.reset_hook;
        let reset = || match hook.as_mut() {
            Some(hook) => hook(),
            None => Ok(()),
        };
        bytecode::run(image.bytes(), &mut self.bus, &mut self.delay, reset)?;
        self.firmware_loaded = true;
        image.update()
    }

    fn init(&mut self) -> Result<()> {
        self.load_firmware()?;
        self.write_reg(WriteReg::Init, 0)?;
        self.delay.delay_ms(INIT_SETTLE_MS);
        Ok(())
    }

    /// Signal source for `default`, unless configuration overrides it
    fn source(&self, default: SignalSource) -> SignalSource {
        match self.config.get_string(SOURCE_KEY) {
            Some(value) => SignalSource::parse(&value).unwrap_or_else(|| {
                warn!("{}: unrecognized signal source {:?}", NAME, value);
                default
            }),
            None => default,
        }
    }

    fn program(&mut self, programming: Programming) -> Result<()> {
        if self.state != LockState::Unconfigured && self.programmed == Some(programming) {
            trace!("{}: channel already programmed", NAME);
            return Ok(());
        }
        self.programmed = None;
        self.state = LockState::Unconfigured;

        self.init()?;
        self.write_reg(WriteReg::SignalSource, programming.source as u16)?;
        self.write_reg(WriteReg::VideoMode, programming.video_mode)?;
        self.write_reg(WriteReg::AudioMode, programming.audio_mode)?;
        if let Some(output_freq) = programming.output_freq {
            self.write_reg(WriteReg::OutputFreq, output_freq)?;
        }
        self.write_reg(WriteReg::InputFreq, programming.input_freq)?;

        debug!("{}: programmed {:?}", NAME, programming);
        self.programmed = Some(programming);
        self.state = LockState::Configured;
        Ok(())
    }
}

impl<T: Transport, C: ConfigStore, D: DelayNs> Lifecycle for Xc5000<T, C, D> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> LockState {
        self.state
    }

    fn start(&mut self, timeout_ms: u32) -> Result<()> {
        if self.state.check_start(NAME)? {
            return Ok(());
        }
        let bus = &mut self.bus;
        let locked = || -> Result<bool> { Ok(read_reg(bus, ReadReg::Lock)? == 1) };
        let waited_ms =
            poll_until_locked(&mut self.delay, timeout_ms, LOCK_POLL_INTERVAL_MS, locked)?;
        debug!("{}: locked after {}ms", NAME, waited_ms);
        self.state = LockState::Locked;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.state == LockState::Locked {
            self.state = LockState::Configured;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.stop()?;
        self.state = LockState::Unconfigured;
        self.programmed = None;
        Ok(())
    }
}

impl<T: Transport, C: ConfigStore, D: DelayNs> DigitalTuner for Xc5000<T, C, D> {
    fn set_channel(&mut self, channel: &DigitalChannel) -> Result<InterfaceNegotiation> {
        let source = self.source(SignalSource::for_modulation(channel.modulation())?);
        let (video_mode, offset_hz) = digital_video_mode(channel.bandwidth_hz())?;
        let input_freq = input_freq_reg(i64::from(channel.frequency_hz()) + offset_hz)?;
        self.program(Programming {
            source,
            video_mode,
            audio_mode: 0x00C0,
            output_freq: Some(output_freq_reg(self.ifreq_hz)),
            input_freq,
        })?;
        Ok(InterfaceNegotiation::default())
    }
}

impl<T: Transport, C: ConfigStore, D: DelayNs> AnalogTuner for Xc5000<T, C, D> {
    fn set_channel(&mut self, channel: &AnalogChannel) -> Result<()> {
        let source = self.source(SignalSource::Air);
        let (video_mode, audio_mode) = analog_modes(channel.video, channel.audio)?;
        let frequency_hz = i64::try_from(channel.frequency_hz).unwrap_or(i64::MAX);
        let input_freq = input_freq_reg(frequency_hz)?;
        self.program(Programming {
            source,
            video_mode,
            audio_mode,
            output_freq: None,
            input_freq,
        })
    }
}
