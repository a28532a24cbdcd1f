//! NXT2004 8-VSB/QAM demodulator
//!
//! The chip holds its microcontroller code in RAM, so every driver instance
//! uploads the configured image on construction through the checksummed
//! burst register and then walks the microcontroller through its init
//! sequence. Microcontroller registers are reached indirectly: address
//! through 0x35, data through 0x36, length and direction through 0x34, and
//! a go bit in 0x21.

use tracing::{debug, info, trace, warn};
use tuner_core::{
    poll_until_locked, BitOrder, ClockMode, ClockPolarity, ConfigStore, DelayNs, DigitalChannel,
    DigitalTuner, InterfaceNegotiation, Lifecycle, LockState, Modulation, Result, SignalQuality,
    StdDelay, Transport, TunerError, LOCK_POLL_INTERVAL_MS,
};
use tuner_firmware::{checksum, FirmwareImage};

const NAME: &str = "NXT2004";

/// Configuration key naming the microcontroller image
pub const FIRMWARE_KEY: &str = "NXT2004_FW";

/// Value of the chip ID register
pub const CHIP_ID: u8 = 0x05;

/// Register taking firmware bursts and the closing checksum
pub const FIRMWARE_REGISTER: u8 = 0x2C;

const MICRO_POLL_MS: u32 = 10;
const MICRO_TIMEOUT_MS: u32 = 1000;

/// Status register and its bits
const STATUS_REGISTER: u8 = 0x31;
const STATUS_LOCKED: u8 = 0x20;
const STATUS_MICRO_STOPPED: u8 = 0x10;

/// One bus step of a fixed register sequence
#[derive(Debug, Clone, Copy)]
enum Step {
    Write(&'static [u8]),
    /// Register read whose value is not used
    Read(u8),
    MicroWrite(u8, &'static [u8]),
    /// Microcontroller read whose value is not used
    MicroRead(u8),
    InitMicro,
    StartMicro,
    StopMicro,
    SoftReset,
}

/// Brings the microcontroller up after the firmware upload
const INIT_STEPS: &[Step] = &[
    Step::Write(&[0x2B, 0x80]),
    Step::Write(&[0x19, 0x01]),
    Step::InitMicro,
    Step::StopMicro,
    Step::StopMicro,
    Step::InitMicro,
    Step::StopMicro,
    Step::MicroWrite(0x08, &[0xFF]),
    Step::MicroWrite(0x08, &[0x00]),
    Step::Write(&[0x57, 0xD7]),
    Step::Write(&[0x35, 0x07, 0xFE]),
    Step::Write(&[0x34, 0x12]),
    Step::Write(&[0x21, 0x80]),
    Step::Write(&[0x0A, 0x21]),
    Step::MicroWrite(0x80, &[0x01]),
    Step::Write(&[0xE9, 0x7E, 0x00]),
    Step::Write(&[0xCC, 0x00]),
    Step::MicroRead(0x80),
    Step::MicroWrite(0x80, &[0x00]),
    Step::SoftReset,
    Step::MicroRead(0x80),
    Step::MicroWrite(0x80, &[0x01]),
    Step::MicroWrite(0x81, &[0x70]),
    Step::MicroWrite(0x82, &[0x31, 0x5E, 0x66]),
    Step::MicroRead(0x88),
    Step::MicroWrite(0x88, &[0x11]),
    Step::MicroRead(0x80),
    Step::MicroWrite(0x80, &[0x40]),
    Step::Read(0x10),
    Step::Write(&[0x10, 0x10]),
    Step::Read(0x0A),
    Step::Write(&[0x0A, 0x21]),
    Step::InitMicro,
    Step::Write(&[0x0A, 0x21]),
    Step::Write(&[0xE9, 0x7E]),
    Step::Write(&[0xEA, 0x00]),
    Step::MicroRead(0x80),
    Step::MicroWrite(0x80, &[0x00]),
    Step::MicroRead(0x80),
    Step::MicroWrite(0x80, &[0x00]),
    Step::SoftReset,
    Step::MicroRead(0x80),
    Step::MicroWrite(0x80, &[0x04]),
    Step::MicroWrite(0x81, &[0x00]),
    Step::MicroWrite(0x82, &[0x80, 0x00, 0x00]),
    Step::MicroRead(0x88),
    Step::MicroWrite(0x88, &[0x11]),
    Step::MicroRead(0x80),
    Step::MicroWrite(0x80, &[0x44]),
    Step::Read(0x10),
    Step::Write(&[0x10, 0x12]),
    Step::Write(&[0x13, 0x04]),
    Step::Write(&[0x16, 0x00]),
    Step::Write(&[0x14, 0x04]),
    Step::Write(&[0x14, 0x00]),
    Step::Write(&[0x17, 0x00]),
    Step::Write(&[0x14, 0x00]),
    Step::Write(&[0x17, 0x00]),
];

/// Equalizer and microcontroller setup between the modulation-specific writes of `start`
const START_STEPS: &[Step] = &[
    Step::Write(&[0x43, 0x05]),
    Step::Write(&[0x46, 0x00, 0x00]),
    Step::Write(&[0x4B, 0x80, 0x00]),
    Step::Write(&[0x4D, 0x00]),
    Step::Write(&[0x55, 0x44]),
    Step::Write(&[0x41, 0x04]),
    Step::MicroRead(0x80),
    Step::MicroWrite(0x80, &[0x24]),
    Step::SoftReset,
    Step::MicroRead(0x80),
    Step::MicroWrite(0x80, &[0x04]),
    Step::MicroWrite(0x81, &[0x00]),
    Step::MicroWrite(0x82, &[0x80, 0x00, 0x00]),
    Step::MicroRead(0x88),
    Step::MicroWrite(0x88, &[0x11]),
    Step::MicroRead(0x80),
    Step::MicroWrite(0x80, &[0x44]),
];

/// Runs the microcontroller and waits for lock once the mode is written
const START_TAIL: &[Step] = &[
    Step::Write(&[0x41, 0x00]),
    Step::Write(&[0x49, 0x80, 0x00]),
    Step::Write(&[0x4B, 0x80, 0x00]),
    Step::Write(&[0x41, 0x04]),
    Step::StartMicro,
    Step::InitMicro,
    Step::Write(&[0x5C, 0xF0]),
];

/// Per-modulation register values: AGC (0x42), equalizer (0x5C), mode (0x30)
pub fn modulation_registers(modulation: Modulation) -> Result<(u8, u8, u8)> {
    match modulation {
        Modulation::Vsb8 => Ok((0x70, 0x60, 0x00)),
        Modulation::Qam64 => Ok((0x74, 0x68, 0x02)),
        Modulation::Qam256 | Modulation::QamAuto => Ok((0x74, 0x64, 0x03)),
        other => Err(TunerError::InvalidArgument(format!(
            "{NAME}: {other} is not supported"
        ))),
    }
}

/// Length/direction byte for register 0x34
///
/// High microcontroller registers other than 0x04 use a separate bank.
pub fn micro_control(register: u8, len: usize, write: bool) -> u8 {
    let high_bank = register & 0x80 != 0 && register != 0x04;
    let direction = match (high_bank, write) {
        (true, true) => 0x50,
        (false, true) => 0x30,
        (true, false) => 0x40,
        (false, false) => 0x20,
    };
    (len as u8) | direction
}

/// SNR in dB for the raw equalizer reading
///
/// Piecewise linear over four ranges; the first range whose floor the
/// reading exceeds applies.
pub fn snr_db(raw: u16) -> f64 {
    const RANGES: [(u16, u16, f64, f64); 4] = [
        (0x7F00, 0x7FFF, 24.0, 6.0),
        (0x7EC0, 0x7F00, 18.0, 6.0),
        (0x7C00, 0x7EC0, 12.0, 6.0),
        (0x0000, 0x7C00, 0.0, 12.0),
    ];
    for (min, max, base, span) in RANGES {
        if raw > min {
            return base + span * f64::from(raw - min) / f64::from(max - min);
        }
    }
    0.0
}

/// Driver for one NXT2004 demodulator
#[derive(Debug)]
pub struct Nxt2004<T, D = StdDelay> {
    bus: T,
    delay: D,
    modulation: Option<Modulation>,
    state: LockState,
    firmware_crc: u16,
}

impl<T: Transport> Nxt2004<T, StdDelay> {
    pub fn new<C: ConfigStore + ?Sized>(bus: T, config: &C) -> Result<Self> {
        Self::with_delay(bus, config, StdDelay)
    }
}

impl<T: Transport, D: DelayNs> Nxt2004<T, D> {
    /// Identify the chip, upload its firmware and initialise it
    pub fn with_delay<C: ConfigStore + ?Sized>(bus: T, config: &C, delay: D) -> Result<Self> {
        let mut demod = Self {
            bus,
            delay,
            modulation: None,
            state: LockState::Unconfigured,
            firmware_crc: 0,
        };
        let id = demod.read_register(0x00)?;
        if id != CHIP_ID {
            return Err(TunerError::DeviceNotFound(format!(
                "{NAME}: unrecognized chip ID {id:#04x}"
            )));
        }
        demod.init(config)?;
        Ok(demod)
    }

    /// Checksum of the uploaded microcontroller image
    pub fn firmware_crc(&self) -> u16 {
        self.firmware_crc
    }

    pub fn modulation(&self) -> Option<Modulation> {
        self.modulation
    }

    fn init<C: ConfigStore + ?Sized>(&mut self, config: &C) -> Result<()> {
        self.bus.write(&[0x1E, 0x00])?;
        let image = FirmwareImage::from_config(config, FIRMWARE_KEY)?;
        self.bus.write(&[0x2B, 0x80])?;
        self.bus.write(&[0x29, 0x10, 0x00, 0x81])?;
        self.firmware_crc = checksum::upload(&mut self.bus, FIRMWARE_REGISTER, image.bytes())?;
        let ack = self.read_register(FIRMWARE_REGISTER)?;
        info!(
            "{}: uploaded {} ({} bytes, crc {:#06x}, ack {:#04x})",
            NAME,
            image.path().display(),
            image.len(),
            self.firmware_crc,
            ack
        );
        self.run(INIT_STEPS)
    }

    fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut value = [0u8; 1];
        self.bus.transact(&[register], &mut value)?;
        Ok(value[0])
    }

    fn run(&mut self, steps: &[Step]) -> Result<()> {
        for step in steps {
            match *step {
                Step::Write(bytes) => self.bus.write(bytes)?,
                Step::Read(register) => {
                    self.read_register(register)?;
                }
                Step::MicroWrite(register, data) => self.micro_write(register, data)?,
                Step::MicroRead(register) => self.micro_read(register, &mut [0u8; 1])?,
                Step::InitMicro => self.init_micro()?,
                Step::StartMicro => self.bus.write(&[0x22, 0x00])?,
                Step::StopMicro => self.stop_micro()?,
                Step::SoftReset => self.soft_reset()?,
            }
        }
        Ok(())
    }

    /// Poll `register` until `done` holds for its value
    fn wait_register(&mut self, register: u8, done: impl Fn(u8) -> bool) -> Result<()> {
        let bus = &mut self.bus;
        let waited_ms = poll_until_locked(&mut self.delay, MICRO_TIMEOUT_MS, MICRO_POLL_MS, || {
            let mut value = [0u8; 1];
            bus.transact(&[register], &mut value)?;
            Ok(done(value[0]))
        })?;
        trace!("{}: register {:#04x} settled after {}ms", NAME, register, waited_ms);
        Ok(())
    }

    fn init_micro(&mut self) -> Result<()> {
        self.bus.write(&[0x2B, 0x00])?;
        self.bus.write(&[0x34, 0x70])?;
        self.bus.write(&[0x35, 0x04])?;
        self.bus
            .write(&[0x36, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0xC0])?;
        self.bus.write(&[0x21, 0x80])?;
        self.wait_register(0x21, |v| v == 0)
    }

    fn stop_micro(&mut self) -> Result<()> {
        self.bus.write(&[0x22, 0x80])?;
        self.wait_register(STATUS_REGISTER, |v| v & STATUS_MICRO_STOPPED != 0)
    }

    fn micro_write(&mut self, register: u8, data: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(0x36);
        frame.extend_from_slice(data);
        self.bus.write(&[0x35, register])?;
        self.bus.write(&frame)?;
        self.bus
            .write(&[0x34, micro_control(register, data.len(), true)])?;
        self.bus.write(&[0x21, 0x80])?;
        let status = self.read_register(0x21)?;
        if status != 0 {
            return Err(TunerError::NotReady(format!(
                "{NAME}: microcontroller rejected write to {register:#04x} ({status:#04x})"
            )));
        }
        Ok(())
    }

    fn micro_read(&mut self, register: u8, out: &mut [u8]) -> Result<()> {
        self.bus.write(&[0x35, register])?;
        self.bus
            .write(&[0x34, micro_control(register, out.len(), false)])?;
        self.bus.write(&[0x21, 0x80])?;
        self.bus.transact(&[0x36], out)?;
        Ok(())
    }

    fn soft_reset(&mut self) -> Result<()> {
        let mut value = [0u8; 1];
        self.micro_read(0x08, &mut value)?;
        self.micro_write(0x08, &[0x10])?;
        self.micro_read(0x08, &mut value)?;
        self.micro_write(0x08, &[0x00])
    }

    fn is_locked(&mut self) -> Result<bool> {
        Ok(self.read_register(STATUS_REGISTER)? & STATUS_LOCKED != 0)
    }
}

impl<T: Transport, D: DelayNs> Lifecycle for Nxt2004<T, D> {
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
        let modulation = self
            .modulation
            .ok_or_else(|| TunerError::NotReady(format!("{NAME}: modulation not configured")))?;
        let (agc, equalizer, mode) = modulation_registers(modulation)?;

        self.micro_read(0x08, &mut [0u8; 1])?;
        self.micro_write(0x08, &[0x08])?;
        self.micro_write(0x08, &[0x00])?;
        self.bus.write(&[0x42, agc])?;
        self.bus.write(&[0x57, 0x07])?;
        self.bus.write(&[0x58, 0x10, 0x00])?;
        self.bus.write(&[0x5C, equalizer, 0x00])?;
        self.run(START_STEPS)?;
        self.bus.write(&[0x30, mode])?;
        self.run(START_TAIL)?;

        let bus = &mut self.bus;
        let locked = || -> Result<bool> {
            let mut status = [0u8; 1];
            bus.transact(&[STATUS_REGISTER], &mut status)?;
            Ok(status[0] & STATUS_LOCKED != 0)
        };
        match poll_until_locked(&mut self.delay, timeout_ms, LOCK_POLL_INTERVAL_MS, locked) {
            Ok(waited_ms) => {
                debug!("{}: locked on {} after {}ms", NAME, modulation, waited_ms);
                self.state = LockState::Locked;
                Ok(())
            }
            Err(e) => {
                warn!("{}: demodulator not locked: {}", NAME, e);
                Err(e)
            }
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
        self.modulation = None;
        Ok(())
    }
}

impl<T: Transport, D: DelayNs> DigitalTuner for Nxt2004<T, D> {
    fn set_channel(&mut self, channel: &DigitalChannel) -> Result<InterfaceNegotiation> {
        let modulation = channel.modulation();
        modulation_registers(modulation)?;
        let clock = if modulation.is_vsb() {
            ClockMode::Normal
        } else {
            ClockMode::Punctured
        };

        self.stop_micro()?;
        self.bus.write(&[0x14, 0x04])?;
        self.bus.write(&[0x17, 0x00])?;
        self.modulation = Some(modulation);
        self.state = LockState::Configured;
        debug!("{}: configured for {}", NAME, modulation);

        Ok(InterfaceNegotiation {
            input_width_bits: 8,
            clock,
            polarity: ClockPolarity::Negative,
            bit_order: BitOrder::MsbFirst,
        })
    }

    fn get_signal(&mut self) -> Result<SignalQuality> {
        let locked = self.is_locked()?;
        self.bus.write(&[0xA1, 0x00])?;
        let mut raw = [0u8; 2];
        self.micro_read(0xA6, &mut raw)?;
        let snr = snr_db(u16::from_be_bytes(raw));

        let mut errors = [0u8; 3];
        self.micro_read(0xE6, &mut errors)?;
        let ber = 8.0 * f64::from(u16::from_be_bytes([errors[0], errors[1]]));
        trace!("{}: snr raw {:02X?} errors {:02X?}", NAME, raw, errors);
        Ok(SignalQuality {
            locked,
            strength: snr / 35.0 * 100.0,
            snr,
            ber,
            uncorrected_blocks: u32::from(errors[2]),
        })
    }
}
