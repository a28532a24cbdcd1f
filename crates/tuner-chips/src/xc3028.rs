//! XC3028 silicon tuner
//!
//! The firmware file is a multi-section blob (see
//! [`tuner_firmware::sections`]). A tuning request picks a base image, then a
//! digital or analog image, and optionally one scan-code table; the loader
//! only transfers what differs from what the chip already holds. Byte-code
//! reset records call a board hook that pulses the tuner's reset line.

use tracing::{debug, trace, warn};
use tuner_core::{
    poll_until_locked, AnalogChannel, AnalogTuner, ConfigExt, ConfigStore, DelayNs,
    DigitalChannel, DigitalTuner, InterfaceNegotiation, Lifecycle, LockState, Result, SignalQuality, StdDelay,
    Transport, TunerError, LOCK_POLL_INTERVAL_MS,
};
use tuner_firmware::sections::{BASE_8MHZ, BASE_FM, DIGITAL_6MHZ, DIGITAL_7MHZ, DIGITAL_8MHZ};
use tuner_firmware::{FirmwareImage, ResetHook, SectionedLoader};

const NAME: &str = "XC3028";

/// Configuration key naming the firmware blob
pub const FIRMWARE_KEY: &str = "XC3028_FW";

/// Configuration key for the settle time after lock, in microseconds
pub const SETTLE_KEY: &str = "XC3028_DELAY";

/// Settle time after lock when none is configured
pub const DEFAULT_SETTLE_US: u32 = 500_000;

/// Input frequency bounds
pub const MIN_FREQUENCY_HZ: u64 = 42_000_000;
pub const MAX_FREQUENCY_HZ: u64 = 864_000_000;

/// Frequency register resolution
const FREQUENCY_STEP_HZ: u64 = 15_625;

const TUNE_SETTLE_MS: u32 = 100;

/// First firmware version taking the newer command preamble
const NEW_COMMANDS_VERSION: u16 = 0x0202;

/// Readable registers
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadReg {
    FrequencyError = 0x0001,
    Lock = 0x0002,
    Snr = 0x0003,
    Version = 0x0004,
}

/// Board-specific firmware selection
///
/// Each flag set is ORed into the flags a tuning request needs, so boards
/// can require e.g. the MTS or second-input variants. The scan-code table
/// is only sent when `scan_code` or `scan_ifreq_khz` is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FirmwareFlags {
    pub base: u16,
    pub digital: u16,
    pub analog: u16,
    pub scan_code: u16,
    /// IF the scan code is built for; 0 accepts any
    pub scan_ifreq_khz: u16,
    /// Table within the scan-code image
    pub scan_table: u8,
}

impl FirmwareFlags {
    fn wants_scan_code(&self) -> bool {
        self.scan_code != 0 || self.scan_ifreq_khz != 0
    }
}

/// Digital firmware flag and tuning offset for a channel bandwidth
pub fn digital_bandwidth(bandwidth_hz: u32) -> Result<(u16, u64)> {
    match bandwidth_hz {
        6_000_000 => Ok((DIGITAL_6MHZ, 1_750_000)),
        7_000_000 => Ok((DIGITAL_7MHZ, 2_250_000)),
        8_000_000 => Ok((DIGITAL_8MHZ, 2_750_000)),
        other => Err(TunerError::InvalidArgument(format!(
            "{NAME}: {other} Hz bandwidth is not supported"
        ))),
    }
}

/// Frequency register value for a tuned frequency
pub fn frequency_divider(frequency_hz: u64) -> Result<u32> {
    if !(MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&frequency_hz) {
        return Err(TunerError::InvalidArgument(format!(
            "{NAME}: {frequency_hz} Hz is outside {MIN_FREQUENCY_HZ}..={MAX_FREQUENCY_HZ} Hz"
        )));
    }
    Ok(((frequency_hz + FREQUENCY_STEP_HZ / 2) / FREQUENCY_STEP_HZ) as u32)
}

fn read_reg<T: Transport + ?Sized>(bus: &mut T, reg: ReadReg) -> Result<u16> {
    let mut data = [0u8; 2];
    bus.transact(&(reg as u16).to_be_bytes(), &mut data)?;
    let value = u16::from_be_bytes(data);
    trace!("{} read {:?} = {:#06x}", NAME, reg, value);
    Ok(value)
}

fn run_hook(hook: &mut Option<ResetHook>) -> Result<()> {
    match hook.as_mut() {
        Some(hook) => hook(),
        None => Ok(()),
    }
}

/// Driver for one XC3028 tuner
pub struct Xc3028<T, C, D = StdDelay> {
    bus: T,
    config: C,
    delay: D,
    loader: SectionedLoader,
    flags: FirmwareFlags,
    reset_hook: Option<ResetHook>,
    state: LockState,
    frequency_hz: Option<u64>,
}

impl<T, C, D> std::fmt::Debug for Xc3028<T, C, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Xc3028")
            .field("firmware_version", &self.loader.version())
            .field("flags", &self.flags)
            .field("state", &self.state)
            .field("frequency_hz", &self.frequency_hz)
            .finish_non_exhaustive()
    }
}

impl<T: Transport, C: ConfigStore> Xc3028<T, C, StdDelay> {
    pub fn new(bus: T, config: C) -> Result<Self> {
        Self::with_delay(bus, config, StdDelay)
    }
}

impl<T: Transport, C: ConfigStore, D: DelayNs> Xc3028<T, C, D> {
    /// Read and index the configured firmware blob
    ///
    /// Nothing is sent to the chip until the first tuning request.
    pub fn with_delay(bus: T, config: C, delay: D) -> Result<Self> {
        let image = FirmwareImage::from_config(&config, FIRMWARE_KEY)?;
        let loader = SectionedLoader::new(image)?;
        debug!("{}: firmware version {:#06x}", NAME, loader.version());
        Ok(Self {
            bus,
            config,
            delay,
            loader,
            flags: FirmwareFlags::default(),
            reset_hook: None,
            state: LockState::Unconfigured,
            frequency_hz: None,
        })
    }

    /// Install the hook run for reset records in the firmware stream
    pub fn with_reset_hook(mut self, hook: impl FnMut() -> Result<()> + Send + 'static) -> Self {
        self.reset_hook = Some(Box::new(hook));
        self
    }

    /// Change the board's firmware selection, applied on the next tuning request
    pub fn set_firmware_flags(&mut self, flags: FirmwareFlags) {
        self.flags = flags;
    }

    pub fn firmware_flags(&self) -> &FirmwareFlags {
        &self.flags
    }

    pub fn firmware_version(&self) -> u16 {
        self.loader.version()
    }

    pub fn loader(&self) -> &SectionedLoader {
        &self.loader
    }

    /// Frequency programmed by the last tuning call
    pub fn frequency_hz(&self) -> Option<u64> {
        self.frequency_hz
    }

    fn load_base(&mut self, flags: u16) -> Result<()> {
        let loaded = self.loader.load_base(&mut self.bus, &mut self.delay, flags, || {
            run_hook(&mut self.reset_hook)
        })?;
        if loaded {
            let running = read_reg(&mut self.bus, ReadReg::Version)?;
            if running != self.loader.version() {
                warn!(
                    "{}: chip reports firmware {:#06x}, file is {:#06x}",
                    NAME,
                    running,
                    self.loader.version()
                );
            }
        }
        Ok(())
    }

    fn load_scan_code(&mut self) -> Result<()> {
        if !self.flags.wants_scan_code() {
            return Ok(());
        }
        self.loader.load_scan_code(
            &mut self.bus,
            self.flags.scan_ifreq_khz,
            self.flags.scan_code,
            self.flags.scan_table,
        )?;
        Ok(())
    }

    fn tune(&mut self, frequency_hz: u64) -> Result<()> {
        let divider = frequency_divider(frequency_hz)?;
        let command = if self.loader.version() < NEW_COMMANDS_VERSION {
            [0x00, 0x02, 0x00, 0x00]
        } else {
            [0x80, 0x02, 0x00, 0x00]
        };
        self.bus.write(&command)?;
        self.bus.write(&divider.to_be_bytes())?;
        self.delay.delay_ms(TUNE_SETTLE_MS);
        debug!("{}: tuned {} Hz (divider {})", NAME, frequency_hz, divider);
        self.frequency_hz = Some(frequency_hz);
        self.state = LockState::Configured;
        Ok(())
    }

    /// Run `program` with the tuner marked unconfigured until it succeeds
    fn program(&mut self, program: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        self.state = LockState::Unconfigured;
        self.frequency_hz = None;
        program(self)
    }
}

impl<T: Transport, C: ConfigStore, D: DelayNs> Lifecycle for Xc3028<T, C, D> {
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
        let locked = || -> Result<bool> { Ok(read_reg(bus, ReadReg::Lock)? != 0) };
        let waited_ms =
            poll_until_locked(&mut self.delay, timeout_ms, LOCK_POLL_INTERVAL_MS, locked)?;
        let settle_us = match self.config.get_number(SETTLE_KEY, 0u32) {
            0 => DEFAULT_SETTLE_US,
            us => us,
        };
        self.delay.delay_us(settle_us);
        debug!("{}: locked after {}ms, settled {}us", NAME, waited_ms, settle_us);
        self.state = LockState::Locked;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.state == LockState::Locked {
            self.state = LockState::Configured;
        }
        Ok(())
    }

    /// Forget the loaded firmware so the next request reloads everything
    fn reset(&mut self) -> Result<()> {
        self.stop()?;
        self.loader.invalidate();
        self.state = LockState::Unconfigured;
        self.frequency_hz = None;
        Ok(())
    }
}

impl<T: Transport, C: ConfigStore, D: DelayNs> DigitalTuner for Xc3028<T, C, D> {
    fn set_channel(&mut self, channel: &DigitalChannel) -> Result<InterfaceNegotiation> {
        let (bandwidth_flag, offset_hz) = digital_bandwidth(channel.bandwidth_hz())?;
        let frequency_hz = u64::from(channel.frequency_hz())
            .checked_sub(offset_hz)
            .unwrap_or_default();
        frequency_divider(frequency_hz)?;
        let modulations = channel.modulation().capability();
        let digital = bandwidth_flag | self.flags.digital;
        if self.loader.index().select_digital(modulations, digital).is_none() {
            return Err(TunerError::InvalidArgument(format!(
                "{NAME}: no firmware for {} at {} Hz bandwidth",
                channel.modulation(),
                channel.bandwidth_hz()
            )));
        }

        let mut base = self.flags.base & !BASE_FM;
        if channel.bandwidth_hz() == 8_000_000 {
            base |= BASE_8MHZ;
        }
        self.program(|tuner| {
            tuner.load_base(base)?;
            tuner.loader.load_digital(
                &mut tuner.bus,
                &mut tuner.delay,
                modulations,
                digital,
                || run_hook(&mut tuner.reset_hook),
            )?;
            tuner.load_scan_code()?;
            tuner.tune(frequency_hz)
        })?;
        Ok(InterfaceNegotiation::default())
    }

    fn get_signal(&mut self) -> Result<SignalQuality> {
        let locked = read_reg(&mut self.bus, ReadReg::Lock)? != 0;
        if !locked {
            return Ok(SignalQuality::default());
        }
        let snr = read_reg(&mut self.bus, ReadReg::Snr)?;
        let error = read_reg(&mut self.bus, ReadReg::FrequencyError)?;
        trace!("{}: frequency error {:#06x}", NAME, error);
        Ok(SignalQuality {
            locked,
            strength: f64::from(snr & 0x0FFF) / 4095.0 * 100.0,
            ..SignalQuality::default()
        })
    }
}

impl<T: Transport, C: ConfigStore, D: DelayNs> AnalogTuner for Xc3028<T, C, D> {
    fn set_channel(&mut self, channel: &AnalogChannel) -> Result<()> {
        frequency_divider(channel.frequency_hz)?;
        let video = channel.video.capability();
        let audio = channel.audio.capability();
        if self.loader.index().select_analog(video, audio, self.flags.analog).is_none() {
            return Err(TunerError::InvalidArgument(format!(
                "{NAME}: no firmware for {:?} with {:?} audio",
                channel.video, channel.audio
            )));
        }

        let mut base = self.flags.base;
        if channel.is_fm_radio() {
            base |= BASE_FM;
        } else {
            base &= !BASE_FM;
            if channel.bandwidth_hz == 8_000_000 {
                base |= BASE_8MHZ;
            }
        }
        let analog = self.flags.analog;
        let frequency_hz = channel.frequency_hz;
        self.program(|tuner| {
            tuner.load_base(base)?;
            tuner.loader.load_analog(
                &mut tuner.bus,
                &mut tuner.delay,
                video,
                audio,
                analog,
                || run_hook(&mut tuner.reset_hook),
            )?;
            tuner.load_scan_code()?;
            tuner.tune(frequency_hz)
        })
    }
}
