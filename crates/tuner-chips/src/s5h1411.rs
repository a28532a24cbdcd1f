//! S5H1411 8-VSB/QAM demodulator
//!
//! A register-programmed part with no firmware. Registers are 16 bits wide
//! and written as `[address, high, low]` rows; the QAM core answers at a
//! second bus address and takes its own rows. Switching between 8-VSB and
//! QAM reprograms the IF and receiver registers, staying within a family
//! only soft-resets the chip.

use tracing::{debug, trace, warn};
use tuner_core::{
    poll_until_locked, BitOrder, ClockMode, ClockPolarity, DelayNs, DigitalChannel, DigitalTuner,
    InterfaceNegotiation, Inversion, Lifecycle, LockState, Modulation, Result, SignalQuality,
    StdDelay, Transport, TunerError, LOCK_POLL_INTERVAL_MS,
};

const NAME: &str = "S5H1411";

/// Chip ID register contents
pub const CHIP_ID: [u8; 2] = [0x00, 0x66];

const INIT: &[[u8; 3]] = &[
    [0xF4, 0x00, 0x00],
    [0xF7, 0x00, 0x00],
    [0xF7, 0x00, 0x01],
    [0xF3, 0x00, 0x00],
    [0x00, 0x00, 0x71],
    [0x08, 0x00, 0x47],
    [0x1C, 0x04, 0x00],
    [0x1E, 0x03, 0x70],
    [0x1F, 0x34, 0x2C],
    [0x24, 0x02, 0x31],
    [0x25, 0x10, 0x11],
    [0x26, 0x0F, 0x07],
    [0x27, 0x0F, 0x04],
    [0x28, 0x07, 0x0F],
    [0x29, 0x28, 0x20],
    [0x2A, 0x10, 0x2E],
    [0x2B, 0x02, 0x20],
    [0x2E, 0x0D, 0x0E],
    [0x2F, 0x10, 0x13],
    [0x31, 0x17, 0x1B],
    [0x32, 0x0E, 0x0F],
    [0x33, 0x0F, 0x10],
    [0x34, 0x17, 0x0E],
    [0x35, 0x4B, 0x10],
    [0x36, 0x0F, 0x17],
    [0x3C, 0x15, 0x77],
    [0x3D, 0x08, 0x1A],
    [0x3E, 0x77, 0xEE],
    [0x40, 0x1E, 0x09],
    [0x41, 0x0F, 0x0C],
    [0x42, 0x1F, 0x10],
    [0x4D, 0x05, 0x09],
    [0x4E, 0x0A, 0x00],
    [0x50, 0x00, 0x00],
    [0x5B, 0x00, 0x00],
    [0x5C, 0x00, 0x08],
    [0x57, 0x11, 0x01],
    [0x65, 0x00, 0x7C],
    [0x68, 0x05, 0x12],
    [0x69, 0x02, 0x58],
    [0x70, 0x00, 0x04],
    [0x71, 0x00, 0x07],
    [0x76, 0x00, 0xA9],
    [0x78, 0x31, 0x41],
    [0x7A, 0x31, 0x41],
    [0xB3, 0x80, 0x03],
    [0xB5, 0xA6, 0xBB],
    [0xB6, 0x06, 0x09],
    [0xB7, 0x2F, 0x06],
    [0xB8, 0x00, 0x3F],
    [0xB9, 0x27, 0x00],
    [0xBA, 0xFA, 0xC8],
    [0xBE, 0x10, 0x03],
    [0xBF, 0x10, 0x3F],
    [0xCE, 0x20, 0x00],
    [0xCF, 0x08, 0x00],
    [0xD0, 0x08, 0x00],
    [0xD1, 0x04, 0x00],
    [0xD2, 0x08, 0x00],
    [0xD3, 0x20, 0x00],
    [0xD4, 0x30, 0x00],
    [0xDB, 0x4A, 0x9B],
    [0xDC, 0x10, 0x00],
    [0xDE, 0x00, 0x01],
    [0xDF, 0x00, 0x00],
    [0xE3, 0x03, 0x01],
];

const QAM_INIT: &[[u8; 3]] = &[
    [0xF3, 0x00, 0x00],
    [0xF3, 0x00, 0x01],
    [0x08, 0x06, 0x00],
    [0x18, 0x42, 0x01],
    [0x1E, 0x64, 0x76],
    [0x21, 0x08, 0x30],
    [0x0C, 0x56, 0x79],
    [0x0D, 0x57, 0x9B],
    [0x24, 0x01, 0x02],
    [0x31, 0x74, 0x88],
    [0x32, 0x0A, 0x08],
    [0x3D, 0x86, 0x89],
    [0x49, 0x00, 0x48],
    [0x57, 0x20, 0x12],
    [0x5D, 0x76, 0x76],
    [0x04, 0x04, 0x00],
    [0x58, 0x00, 0xC0],
    [0x5B, 0x01, 0x00],
];

const VSB_RECEIVER: &[[u8; 3]] = &[
    [0x00, 0x00, 0x71],
    [0xF6, 0x00, 0x00],
    [0xCD, 0x00, 0xF1],
];

const QAM_RECEIVER: &[[u8; 3]] = &[[0x00, 0x01, 0x71], [0xF6, 0x00, 0x01]];
const QAM_CORE_RECEIVER: [u8; 3] = [0x16, 0x11, 0x01];
const QAM_RECEIVER_TAIL: [u8; 3] = [0xCD, 0x00, 0xF0];

const SLEEP: [u8; 3] = [0xF4, 0x00, 0x01];

/// IF the demodulator is fed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IfFrequency {
    Mhz3_25,
    Mhz3_5,
    Mhz4,
    #[default]
    Mhz5_38,
    Mhz44,
}

impl IfFrequency {
    pub fn hz(&self) -> u32 {
        match self {
            IfFrequency::Mhz3_25 => 3_250_000,
            IfFrequency::Mhz3_5 => 3_500_000,
            IfFrequency::Mhz4 => 4_000_000,
            IfFrequency::Mhz5_38 => 5_380_000,
            IfFrequency::Mhz44 => 44_000_000,
        }
    }

    /// Two rows for the main core, then the QAM core's row
    ///
    /// 5.38 MHz and 44 MHz share the chip's default values.
    pub fn registers(&self) -> [[u8; 3]; 3] {
        match self {
            IfFrequency::Mhz3_25 => [[0x38, 0x10, 0xD5], [0x39, 0x53, 0x42], [0x2C, 0x10, 0xD9]],
            IfFrequency::Mhz3_5 => [[0x38, 0x12, 0x25], [0x39, 0x1E, 0x96], [0x2C, 0x12, 0x25]],
            IfFrequency::Mhz4 => [[0x38, 0x14, 0xBC], [0x39, 0xB5, 0x3E], [0x2C, 0x14, 0xBD]],
            IfFrequency::Mhz5_38 | IfFrequency::Mhz44 => {
                [[0x38, 0x1B, 0xE4], [0x39, 0x36, 0x55], [0x2C, 0x1B, 0xE4]]
            }
        }
    }
}

/// Transport stream clock behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OutputClock {
    #[default]
    ContinuousInverted,
    ContinuousNonInverted,
    GatedInverted,
    GatedNonInverted,
}

impl OutputClock {
    fn bits(&self) -> u8 {
        match self {
            OutputClock::ContinuousInverted => 0,
            OutputClock::ContinuousNonInverted => 1,
            OutputClock::GatedInverted => 2,
            OutputClock::GatedNonInverted => 3,
        }
    }
}

/// Board wiring of one S5H1411
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoardConfig {
    /// Serial transport stream output instead of 8-bit parallel
    pub serial_output: bool,
    pub vsb_ifreq: IfFrequency,
    pub qam_ifreq: IfFrequency,
    /// Drive the GPIO pin
    pub gpio: bool,
    pub clock: OutputClock,
}

/// Driver for one S5H1411 demodulator
///
/// `bus` addresses the main core, `qam_bus` the QAM core.
#[derive(Debug)]
pub struct S5h1411<T: Transport, Q: Transport, D: DelayNs = StdDelay> {
    bus: T,
    qam_bus: Q,
    delay: D,
    board: BoardConfig,
    inversion: Inversion,
    modulation: Option<Modulation>,
    state: LockState,
}

impl<T: Transport, Q: Transport> S5h1411<T, Q, StdDelay> {
    pub fn new(bus: T, qam_bus: Q, board: BoardConfig) -> Result<Self> {
        Self::with_delay(bus, qam_bus, board, StdDelay)
    }
}

impl<T: Transport, Q: Transport, D: DelayNs> S5h1411<T, Q, D> {
    /// Identify the chip and program its power-on register set
    pub fn with_delay(mut bus: T, qam_bus: Q, board: BoardConfig, delay: D) -> Result<Self> {
        let mut id = [0u8; 2];
        bus.transact(&[0x05], &mut id)?;
        if id != CHIP_ID {
            return Err(TunerError::DeviceNotFound(format!(
                "{NAME}: unrecognized chip ID {id:02X?}"
            )));
        }
        let mut demod = Self {
            bus,
            qam_bus,
            delay,
            board,
            inversion: Inversion::Off,
            modulation: None,
            state: LockState::Unconfigured,
        };
        demod.init()?;
        debug!("{}: initialised with {:?}", NAME, demod.board);
        Ok(demod)
    }

    pub fn board(&self) -> &BoardConfig {
        &self.board
    }

    pub fn modulation(&self) -> Option<Modulation> {
        self.modulation
    }

    fn init(&mut self) -> Result<()> {
        self.bus.write_array(INIT.as_flattened(), 3)?;
        self.qam_bus.write_array(QAM_INIT.as_flattened(), 3)?;

        let serial = self.board.serial_output;
        self.update_register(0xBD, |[hi, lo]| {
            [if serial { hi | 0x01 } else { hi & 0xFE }, lo]
        })?;
        self.write_inversion()?;
        self.write_ifreq(self.board.vsb_ifreq)?;
        let gpio = self.board.gpio;
        self.update_register(0xE0, |[hi, lo]| {
            [hi, if gpio { lo | 0x02 } else { lo & 0xFD }]
        })?;

        let (address, [hi, lo]) = (0xBE, self.read_register(0xBE)?);
        self.bus
            .write(&[address, (hi & 0xCF) | (self.board.clock.bits() << 4), lo])?;

        self.soft_reset()?;
        self.set_gate(true)
    }

    fn read_register(&mut self, address: u8) -> Result<[u8; 2]> {
        let mut value = [0u8; 2];
        self.bus.transact(&[address], &mut value)?;
        trace!("{} reg {:#04x} = {:02X?}", NAME, address, value);
        Ok(value)
    }

    /// Read-modify-write that skips the write when nothing changes
    fn update_register(&mut self, address: u8, f: impl FnOnce([u8; 2]) -> [u8; 2]) -> Result<()> {
        let current = self.read_register(address)?;
        let [hi, lo] = f(current);
        if [hi, lo] != current {
            self.bus.write(&[address, hi, lo])?;
        }
        Ok(())
    }

    fn write_inversion(&mut self) -> Result<()> {
        let [hi, lo] = self.read_register(0x24)?;
        let hi = if self.inversion == Inversion::On {
            hi | 0x10
        } else {
            hi & 0xEF
        };
        self.bus.write(&[0x24, hi, lo])?;
        Ok(())
    }

    fn write_ifreq(&mut self, ifreq: IfFrequency) -> Result<()> {
        let [main_a, main_b, qam] = ifreq.registers();
        self.bus.write_array(&[main_a, main_b].concat(), 3)?;
        self.qam_bus.write(&qam)?;
        trace!("{}: IF {} Hz", NAME, ifreq.hz());
        Ok(())
    }

    fn soft_reset(&mut self) -> Result<()> {
        self.bus.write(&[0xF7, 0x00, 0x00])?;
        self.bus.write(&[0xF7, 0x00, 0x01])?;
        Ok(())
    }

    /// Open or close the pass-through to the tuner behind the demodulator
    fn set_gate(&mut self, open: bool) -> Result<()> {
        self.bus.write(&[0xF5, 0x00, u8::from(open)])?;
        Ok(())
    }

    fn is_locked(&mut self) -> Result<bool> {
        lock_status(&mut self.bus, self.modulation)
    }
}

/// 8-VSB reports lock in the sync register, QAM in the QAM status register
fn lock_status<T: Transport + ?Sized>(bus: &mut T, modulation: Option<Modulation>) -> Result<bool> {
    let mut value = [0u8; 2];
    Ok(match modulation {
        Some(Modulation::Vsb8) => {
            bus.transact(&[0xF2], &mut value)?;
            value[0] & 0x10 != 0
        }
        _ => {
            bus.transact(&[0xF0], &mut value)?;
            value[1] & 0x10 != 0
        }
    })
}

impl<T: Transport, Q: Transport, D: DelayNs> Drop for S5h1411<T, Q, D> {
    fn drop(&mut self) {
        let result = self
            .set_gate(true)
            .and_then(|_| self.bus.write(&SLEEP).map_err(Into::into));
        if let Err(e) = result {
            warn!("{}: sleep on drop failed: {}", NAME, e);
        }
    }
}

impl<T: Transport, Q: Transport, D: DelayNs> Lifecycle for S5h1411<T, Q, D> {
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
        self.soft_reset()?;
        self.set_gate(false)?;

        let modulation = self.modulation;
        let bus = &mut self.bus;
        match poll_until_locked(&mut self.delay, timeout_ms, LOCK_POLL_INTERVAL_MS, || {
            lock_status(bus, modulation)
        }) {
            Ok(waited_ms) => debug!("{}: locked after {}ms", NAME, waited_ms),
            Err(e) => {
                warn!("{}: demodulator not locked: {}", NAME, e);
                return Err(e);
            }
        }
        self.state = LockState::Locked;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.set_gate(true)?;
        if self.state == LockState::Locked {
            self.state = LockState::Configured;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.set_gate(true)?;
        self.state = LockState::Unconfigured;
        self.modulation = None;
        Ok(())
    }
}

impl<T: Transport, Q: Transport, D: DelayNs> DigitalTuner for S5h1411<T, Q, D> {
    fn set_channel(&mut self, channel: &DigitalChannel) -> Result<InterfaceNegotiation> {
        let modulation = channel.modulation();
        if !matches!(
            modulation,
            Modulation::Vsb8 | Modulation::Qam64 | Modulation::Qam256 | Modulation::QamAuto
        ) {
            return Err(TunerError::InvalidArgument(format!(
                "{NAME}: {modulation} is not supported"
            )));
        }

        self.soft_reset()?;
        let inversion = match channel.inversion() {
            Inversion::Auto => Inversion::Off,
            other => other,
        };
        if inversion != self.inversion {
            self.inversion = inversion;
            self.write_inversion()?;
        }

        let family_changed = match self.modulation {
            Some(current) => current.is_vsb() != modulation.is_vsb(),
            None => true,
        };
        if family_changed {
            // A failed reprogram leaves the receiver in an unknown mode
            self.modulation = None;
            if modulation.is_vsb() {
                self.write_ifreq(self.board.vsb_ifreq)?;
                self.bus.write_array(VSB_RECEIVER.as_flattened(), 3)?;
            } else {
                self.write_ifreq(self.board.qam_ifreq)?;
                self.bus.write_array(QAM_RECEIVER.as_flattened(), 3)?;
                self.qam_bus.write(&QAM_CORE_RECEIVER)?;
                self.bus.write(&QAM_RECEIVER_TAIL)?;
            }
            debug!("{}: receiver switched to {}", NAME, modulation);
        }
        self.modulation = Some(modulation);
        self.soft_reset()?;
        self.state = LockState::Configured;

        Ok(InterfaceNegotiation {
            input_width_bits: if self.board.serial_output { 1 } else { 8 },
            clock: ClockMode::Punctured,
            polarity: ClockPolarity::Negative,
            bit_order: BitOrder::MsbFirst,
        })
    }

    fn get_signal(&mut self) -> Result<SignalQuality> {
        let modulation = self
            .modulation
            .ok_or_else(|| TunerError::NotReady(format!("{NAME}: no channel set")))?;
        let locked = self.is_locked()?;
        let uncorrected = u16::from_be_bytes(self.read_register(0xC9)?);
        let strength = if modulation == Modulation::Vsb8 {
            let [hi, lo] = self.read_register(0xF2)?;
            f64::from((u16::from(hi & 0x03) << 8) | u16::from(lo)) / 927.0
        } else {
            let raw = u16::from_be_bytes(self.read_register(0xF1)?);
            (67_951.0 - f64::from(raw)) / 65_535.0
        };
        Ok(SignalQuality {
            locked,
            strength: (strength * 100.0).min(100.0),
            snr: 0.0,
            ber: 0.0,
            uncorrected_blocks: u32::from(uncorrected),
        })
    }
}
