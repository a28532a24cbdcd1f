//! OR51132 8-VSB/QAM demodulator
//!
//! The demodulator runs from one of two firmware images, one per modulation
//! family. Switching family forces a reload; within a family the image is
//! only transferred when the file changed since it was last applied. Each
//! image is a flat split-transfer blob followed by a fixed handshake that
//! ends with a firmware version readback.

use tracing::{debug, info, trace, warn};
use tuner_core::{
    BitOrder, ClockMode, ClockPolarity, ConfigStore, DelayNs, DigitalChannel, DigitalTuner,
    InterfaceNegotiation, Lifecycle, LockState, Modulation, Result, SignalQuality, StdDelay,
    Transport, TunerError, LOCK_POLL_INTERVAL_MS,
};
use tuner_firmware::{load_split, FirmwareImage};

const NAME: &str = "OR51132";

/// Configuration key naming the 8-VSB firmware file
pub const VSB_FIRMWARE_KEY: &str = "OR51132_VSB_FW";

/// Configuration key naming the QAM firmware file
pub const QAM_FIRMWARE_KEY: &str = "OR51132_QAM_FW";

/// Wait between a status request and its reply
const STATUS_SETTLE_MS: u32 = 30;

/// Wait between handshake steps
const HANDSHAKE_STEP_MS: u32 = 20;

/// Status bit reporting lock
const STATUS_LOCKED: u8 = 0x01;

/// Status bit reporting an active NTSC co-channel filter
const STATUS_NTSC_FILTER: u8 = 0x10;

/// Receiver mode, as written to and reported by the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DemodMode {
    #[default]
    Unknown,
    Vsb,
    Qam64,
    Qam256,
    QamAuto,
}

impl DemodMode {
    /// Mode byte used on the bus
    pub fn code(&self) -> u8 {
        match self {
            DemodMode::Unknown => 0x00,
            DemodMode::Vsb => 0x06,
            DemodMode::Qam64 => 0x43,
            DemodMode::Qam256 => 0x45,
            DemodMode::QamAuto => 0x4F,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0x06 => DemodMode::Vsb,
            0x43 => DemodMode::Qam64,
            0x45 => DemodMode::Qam256,
            0x4F => DemodMode::QamAuto,
            _ => DemodMode::Unknown,
        }
    }

    pub fn for_modulation(modulation: Modulation) -> Result<Self> {
        match modulation {
            Modulation::Vsb8 => Ok(DemodMode::Vsb),
            Modulation::Qam64 => Ok(DemodMode::Qam64),
            Modulation::Qam256 => Ok(DemodMode::Qam256),
            Modulation::QamAuto => Ok(DemodMode::QamAuto),
            other => Err(TunerError::InvalidArgument(format!(
                "{NAME}: {other} is not supported"
            ))),
        }
    }

    pub fn is_qam(&self) -> bool {
        matches!(
            self,
            DemodMode::Qam64 | DemodMode::Qam256 | DemodMode::QamAuto
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            DemodMode::Unknown => "unknown",
            DemodMode::Vsb => "8-VSB",
            DemodMode::Qam64 => "QAM-64",
            DemodMode::Qam256 => "QAM-256",
            DemodMode::QamAuto => "QAM-auto",
        }
    }
}

/// SNR numerator per reported mode
fn snr_constant(mode: DemodMode) -> Option<f64> {
    match mode {
        DemodMode::Vsb | DemodMode::Qam64 => Some(897_152_044.8282),
        DemodMode::Qam256 => Some(907_832_426.314266),
        DemodMode::QamAuto | DemodMode::Unknown => None,
    }
}

/// Signal-to-noise ratio in dB for a raw noise reading
pub fn snr_db(mode: DemodMode, noise: u16, ntsc_filter: bool) -> Option<f64> {
    let numerator = snr_constant(mode)?;
    let noise = f64::from(noise.max(1));
    let correction = if mode == DemodMode::Vsb && ntsc_filter { 3.0 } else { 0.0 };
    Some(10.0 * (numerator / (noise * noise)).log10() - correction)
}

/// Format the eight version bytes read back after a firmware load
pub fn format_version(raw: &[u8; 8]) -> String {
    format!(
        "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}",
        raw[1], raw[0], raw[3], raw[2], raw[5], raw[4], raw[7], raw[6]
    )
}

/// Driver for one OR51132 demodulator
#[derive(Debug)]
pub struct Or51132<T, C, D = StdDelay> {
    bus: T,
    config: C,
    delay: D,
    mode: DemodMode,
    state: LockState,
    firmware_version: Option<String>,
}

impl<T: Transport, C: ConfigStore> Or51132<T, C, StdDelay> {
    pub fn new(bus: T, config: C) -> Self {
        Self::with_delay(bus, config, StdDelay)
    }
}

impl<T: Transport, C: ConfigStore, D: DelayNs> Or51132<T, C, D> {
    /// Create a driver, asking the chip which mode its current firmware runs
    ///
    /// A chip that does not answer is treated as running no firmware.
    pub fn with_delay(bus: T, config: C, delay: D) -> Self {
        let mut demod = Self {
            bus,
            config,
            delay,
            mode: DemodMode::Unknown,
            state: LockState::Unconfigured,
            firmware_version: None,
        };
        match demod.read_status() {
            Ok((mode, _)) => demod.mode = mode,
            Err(e) => warn!("{}: status request failed: {}", NAME, e),
        }
        debug!("{}: running {} firmware", NAME, demod.mode.name());
        demod
    }

    /// Mode of the loaded firmware, as last configured or reported
    pub fn mode(&self) -> DemodMode {
        self.mode
    }

    /// Version string read back by the last firmware load
    pub fn firmware_version(&self) -> Option<&str> {
        self.firmware_version.as_deref()
    }

    /// Request the status word: reported mode and status bits
    fn read_status(&mut self) -> Result<(DemodMode, u8)> {
        self.bus.write(&[0x04, 0x00])?;
        self.delay.delay_ms(STATUS_SETTLE_MS);
        let mut status = [0u8; 2];
        self.bus.read(&mut status)?;
        trace!("{} status {:02X?}", NAME, status);
        Ok((DemodMode::from_code(status[0]), status[1]))
    }

    fn firmware_key(mode: DemodMode) -> &'static str {
        if mode.is_qam() {
            QAM_FIRMWARE_KEY
        } else {
            VSB_FIRMWARE_KEY
        }
    }

    /// Load the firmware for `mode`, unless it is current and `force` is false
    ///
    /// Returns whether a transfer took place.
    fn load_firmware(&mut self, mode: DemodMode, force: bool) -> Result<bool> {
        let mut image = FirmwareImage::from_config(&self.config, Self::firmware_key(mode))?;
        if !force && image.up_to_date() {
            debug!("{}: firmware {} is current", NAME, image.path().display());
            return Ok(false);
        }
        let version = load_split(&mut image, &mut self.bus, &mut self.delay, handshake::<T, D>)?;
        info!("{}: firmware revision {}", NAME, version);
        self.firmware_version = Some(version);
        Ok(true)
    }
}

/// Start the uploaded code and read back its version
fn handshake<T, D>(bus: &mut T, delay: &mut D) -> Result<String>
where
    T: Transport + ?Sized,
    D: DelayNs + ?Sized,
{
    bus.write(&[0x7F, 0x01])?;
    delay.delay_ms(HANDSHAKE_STEP_MS);
    bus.write(&[0x7F, 0x01])?;
    delay.delay_ms(70);
    bus.write(&[0x10, 0x10, 0x00])?;
    delay.delay_ms(HANDSHAKE_STEP_MS);
    bus.write(&[0x04, 0x17])?;
    delay.delay_ms(HANDSHAKE_STEP_MS);
    bus.write(&[0x00, 0x00])?;

    let mut raw = [0u8; 8];
    for pair in raw.chunks_mut(2) {
        delay.delay_ms(HANDSHAKE_STEP_MS);
        bus.read(pair)?;
    }
    delay.delay_ms(HANDSHAKE_STEP_MS);
    bus.write(&[0x10, 0x00, 0x00])?;
    Ok(format_version(&raw))
}

impl<T: Transport, C: ConfigStore, D: DelayNs> Lifecycle for Or51132<T, C, D> {
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
        let (operation, receiver) = match self.mode {
            DemodMode::Vsb => (0x50, 0x03),
            DemodMode::Unknown => {
                return Err(TunerError::NotReady(format!("{NAME}: modulation not configured")))
            }
            _ => (0x5F, 0x00),
        };
        let configure = [
            [0x04, 0x01, operation],
            [0x1C, receiver, self.mode.code()],
        ];
        for (i, command) in configure.iter().enumerate() {
            if i > 0 {
                self.delay.delay_ms(HANDSHAKE_STEP_MS);
            }
            if let Err(e) = self.bus.write(command) {
                warn!("{}: start failed writing {:02X?}: {}", NAME, command, e);
                self.mode = DemodMode::Unknown;
                self.state = LockState::Unconfigured;
                return Err(e.into());
            }
        }
        self.delay.delay_ms(STATUS_SETTLE_MS);

        // Each status request already waits STATUS_SETTLE_MS, which counts
        // toward the poll interval.
        let mut waited_ms = 0u32;
        loop {
            let (mode, status) = self.read_status()?;
            if mode == DemodMode::Unknown {
                self.mode = mode;
                self.state = LockState::Unconfigured;
                return Err(TunerError::NotReady(format!(
                    "{NAME}: demodulator reports no mode"
                )));
            }
            self.mode = mode;
            if status & STATUS_LOCKED != 0 {
                debug!("{}: locked in {} after {}ms", NAME, mode.name(), waited_ms);
                self.state = LockState::Locked;
                return Ok(());
            }
            if waited_ms >= timeout_ms {
                warn!("{}: no lock after {}ms", NAME, waited_ms);
                return Err(TunerError::Timeout { waited_ms });
            }
            self.delay.delay_ms(LOCK_POLL_INTERVAL_MS - STATUS_SETTLE_MS);
            waited_ms = waited_ms.saturating_add(LOCK_POLL_INTERVAL_MS);
        }
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
        // the next channel reloads firmware unconditionally
        self.mode = DemodMode::Unknown;
        Ok(())
    }
}

impl<T: Transport, C: ConfigStore, D: DelayNs> DigitalTuner for Or51132<T, C, D> {
    fn set_channel(&mut self, channel: &DigitalChannel) -> Result<InterfaceNegotiation> {
        let mode = DemodMode::for_modulation(channel.modulation())?;
        let negotiation = InterfaceNegotiation {
            input_width_bits: 8,
            clock: if mode.is_qam() {
                ClockMode::Punctured
            } else {
                ClockMode::Normal
            },
            polarity: ClockPolarity::Negative,
            bit_order: BitOrder::MsbFirst,
        };

        let previous = self.mode;
        let force = previous.is_qam() != mode.is_qam() || previous == DemodMode::Unknown;
        match self.load_firmware(mode, force) {
            Ok(transferred) => {
                if transferred || previous != mode || self.state == LockState::Unconfigured {
                    self.state = LockState::Configured;
                }
                self.mode = mode;
                Ok(negotiation)
            }
            Err(e) => {
                warn!("{}: firmware load for {} failed: {}", NAME, mode.name(), e);
                self.mode = DemodMode::Unknown;
                self.state = LockState::Unconfigured;
                Err(e)
            }
        }
    }

    fn get_signal(&mut self) -> Result<SignalQuality> {
        let (mode, status) = self.read_status()?;
        if mode == DemodMode::Unknown || status & STATUS_LOCKED == 0 {
            return Err(TunerError::NotReady(format!("{NAME}: no lock")));
        }
        if snr_constant(mode).is_none() {
            return Err(TunerError::Unsupported(format!(
                "{NAME}: no signal measurement in {} mode",
                mode.name()
            )));
        }

        self.bus.write(&[0x04, 0x02])?;
        self.delay.delay_ms(STATUS_SETTLE_MS);
        let mut raw = [0u8; 2];
        self.bus.read(&mut raw)?;
        let noise = u16::from_le_bytes(raw);
        let snr = snr_db(mode, noise, status & STATUS_NTSC_FILTER != 0).unwrap_or_default();
        trace!("{}: noise {} snr {:.2}dB", NAME, noise, snr);
        Ok(SignalQuality {
            locked: true,
            strength: snr / 35.0 * 100.0,
            snr,
            ber: 0.0,
            uncorrected_blocks: 0,
        })
    }
}
